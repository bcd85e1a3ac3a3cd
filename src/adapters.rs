//! External collaborator interfaces
//!
//! The orchestrator drives everything through these four traits; concrete
//! implementations live in `voice/` and `chat.rs` and are bound at startup,
//! which lets tests substitute scripted fakes for all of them.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Captures speech and turns it into text
#[async_trait]
pub trait SpeechInput: Send + Sync {
    /// One-time ambient noise calibration, run once at startup
    ///
    /// # Errors
    ///
    /// Returns error if the input channel is unusable; the caller treats
    /// this as fatal since no turn can proceed without it
    async fn calibrate(&mut self) -> Result<()>;

    /// Listen for one utterance and return the recognized text
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NoSpeech`] if nothing was said within
    /// `timeout`, or [`crate::Error::Stt`] if recognition fails
    async fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<String>;
}

/// Produces a chat reply for a user message
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send the user's message and return the assistant's reply
    ///
    /// Implementations own their conversation history.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RateLimited`] or [`crate::Error::Chat`] if
    /// the completion call fails
    async fn complete(&mut self, message: &str) -> Result<String>;
}

/// Renders text into audio
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Synthesize `text` into audio bytes (MP3)
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Tts`] if synthesis fails
    async fn synthesize(&self, text: &str, voice: &str, language: &str) -> Result<Vec<u8>>;
}

/// Plays audio to the output device
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play MP3 audio to completion
    ///
    /// The output device is acquired for the duration of the call and
    /// released when playback completes or fails.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Audio`] if decoding or playback fails
    async fn play(&mut self, audio: &[u8]) -> Result<()>;
}
