//! Lyra - voice assistant orchestrator
//!
//! This library provides the core of a spoken conversation loop:
//! - Turn orchestration (listen, complete, synthesize, play) with per-turn
//!   failure recovery and multilingual exit detection
//! - A content-addressed, size-bounded cache of synthesized responses
//! - Adapter traits for speech recognition, chat completion, synthesis,
//!   and playback, with concrete implementations for the default stack
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                    Session                        │
//! │  listen → normalize → complete → speak → play    │
//! └──────┬──────────┬───────────┬──────────┬─────────┘
//!        │          │           │          │
//!   SpeechInput ChatCompletion SpeechOutput AudioSink
//!        │          │           │          │
//!     mic + STT   Gemini   TTS + ResponseCache  speakers
//! ```

pub mod adapters;
pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod persona;
pub mod session;
pub mod text;
pub mod voice;

pub use adapters::{AudioSink, ChatCompletion, SpeechInput, SpeechOutput};
pub use cache::{CacheKey, ResponseCache};
pub use chat::GeminiChat;
pub use config::Config;
pub use error::{Error, Result};
pub use persona::Persona;
pub use session::{Session, Turn, TurnOutcome, TurnStage};
pub use text::normalize;
