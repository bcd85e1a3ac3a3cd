//! Error types for the Lyra assistant

use thiserror::Error;

/// Result type alias for Lyra operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Lyra assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credential, unusable device); fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// No speech detected within the listen window
    #[error("no speech detected")]
    NoSpeech,

    /// Speech recognition service error
    #[error("STT error: {0}")]
    Stt(String),

    /// Chat completion error
    #[error("chat error: {0}")]
    Chat(String),

    /// Chat completion was rate limited
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Text-to-speech synthesis error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio device or playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Response cache error (backing file missing or unreadable)
    #[error("cache error: {0}")]
    Cache(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
