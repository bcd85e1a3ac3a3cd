//! Speech input adapter: microphone capture plus Google speech recognition

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::capture::{AudioCapture, SAMPLE_RATE, rms, samples_to_wav};
use super::endpoint::{PhraseDetector, PhraseState};
use crate::adapters::SpeechInput;
use crate::{Error, Result};

const RECOGNIZE_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";

/// How often the capture buffer is polled during a listen
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long ambient noise is sampled during calibration
const CALIBRATION_WINDOW: Duration = Duration::from_secs(1);

/// Floor for the speech energy threshold, used when the room is very quiet
const MIN_THRESHOLD: f32 = 0.01;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    language_code: String,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<SpeechResult>,
}

#[derive(Deserialize)]
struct SpeechResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    transcript: String,
}

/// Listens on the default microphone and recognizes speech via the Google
/// Speech API
///
/// The blocking capture work (cpal streams are not `Send`) runs on the
/// blocking thread pool; only the recognized samples cross back into async.
pub struct GoogleSpeechInput {
    client: reqwest::Client,
    api_key: String,
    language: String,
    threshold: f32,
}

impl GoogleSpeechInput {
    /// Create a new speech input adapter
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, language: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "Google API key required for speech recognition".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            language,
            threshold: MIN_THRESHOLD,
        })
    }

    /// Recognize a captured phrase
    async fn recognize(&self, samples: Vec<f32>) -> Result<String> {
        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        tracing::debug!(wav_bytes = wav.len(), "sending audio for recognition");

        let request = RecognizeRequest {
            config: RecognitionConfig {
                language_code: self.language.clone(),
            },
            audio: RecognitionAudio {
                content: BASE64.encode(&wav),
            },
        };

        let response = self
            .client
            .post(format!("{RECOGNIZE_URL}?key={}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Stt(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "recognition API error");
            return Err(Error::Stt(format!("recognition API error {status}: {body}")));
        }

        let result: RecognizeResponse =
            response.json().await.map_err(|e| Error::Stt(e.to_string()))?;

        let transcript = result
            .results
            .first()
            .and_then(|r| r.alternatives.first())
            .map(|a| a.transcript.trim().to_string())
            .unwrap_or_default();

        if transcript.is_empty() {
            // The service heard audio but recognized no words
            return Err(Error::NoSpeech);
        }

        tracing::info!(transcript = %transcript, "recognition complete");
        Ok(transcript)
    }
}

#[async_trait]
impl SpeechInput for GoogleSpeechInput {
    async fn calibrate(&mut self) -> Result<()> {
        let ambient = tokio::task::spawn_blocking(sample_ambient_noise)
            .await
            .map_err(|e| Error::Audio(format!("calibration task failed: {e}")))??;

        self.threshold = (ambient * 1.5).max(MIN_THRESHOLD);
        tracing::info!(ambient, threshold = self.threshold, "ambient noise calibration complete");
        Ok(())
    }

    async fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<String> {
        let threshold = self.threshold;
        let samples =
            tokio::task::spawn_blocking(move || capture_phrase(threshold, timeout, phrase_limit))
                .await
                .map_err(|e| Error::Audio(format!("capture task failed: {e}")))??;

        self.recognize(samples).await
    }
}

/// Measure ambient RMS energy over the calibration window
fn sample_ambient_noise() -> Result<f32> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;
    std::thread::sleep(CALIBRATION_WINDOW);
    let samples = capture.take_buffer();
    capture.stop();

    if samples.is_empty() {
        return Err(Error::Audio("no audio captured during calibration".to_string()));
    }
    Ok(rms(&samples))
}

/// Record until a phrase completes, the phrase limit is hit, or the timeout
/// expires with no speech
fn capture_phrase(threshold: f32, timeout: Duration, phrase_limit: Duration) -> Result<Vec<f32>> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let limit_samples = (phrase_limit.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize;

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    let mut detector = PhraseDetector::new(threshold);
    let start = Instant::now();

    let result = loop {
        std::thread::sleep(POLL_INTERVAL);
        let chunk = capture.take_buffer();

        match detector.process(&chunk) {
            PhraseState::Complete => break Ok(detector.take_phrase()),
            PhraseState::Waiting if start.elapsed() > timeout => break Err(Error::NoSpeech),
            PhraseState::Capturing if detector.captured_len() > limit_samples => {
                tracing::debug!("phrase limit reached, cutting off");
                break Ok(detector.take_phrase());
            }
            PhraseState::Waiting | PhraseState::Capturing => {}
        }
    };

    capture.stop();
    result
}
