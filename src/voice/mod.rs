//! Voice processing module
//!
//! Microphone capture, utterance endpointing, speech recognition,
//! synthesis, and playback. The orchestrator consumes these through the
//! traits in [`crate::adapters`].

mod capture;
mod endpoint;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, rms, samples_to_wav};
pub use endpoint::{PhraseDetector, PhraseState};
pub use playback::AudioPlayback;
pub use stt::GoogleSpeechInput;
pub use tts::GoogleTranslateTts;
