//! Speech output adapter: Google Translate text-to-speech

use async_trait::async_trait;

use crate::adapters::SpeechOutput;
use crate::{Error, Result};

const TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Synthesizes speech via the Google Translate TTS endpoint
///
/// The voice is fixed per language on this service; the `voice` argument
/// still participates in cache-key derivation upstream.
pub struct GoogleTranslateTts {
    client: reqwest::Client,
}

impl GoogleTranslateTts {
    /// Create a new TTS adapter
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GoogleTranslateTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechOutput for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, _voice: &str, language: &str) -> Result<Vec<u8>> {
        if text.is_empty() {
            return Err(Error::Tts("cannot synthesize empty text".to_string()));
        }

        tracing::debug!(chars = text.chars().count(), language, "synthesizing speech");

        let response = self
            .client
            .get(TTS_URL)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| Error::Tts(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TTS API error");
            return Err(Error::Tts(format!("TTS API error {status}: {body}")));
        }

        let audio = response.bytes().await.map_err(|e| Error::Tts(e.to_string()))?;
        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}
