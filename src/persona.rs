//! Persona definition
//!
//! A persona bundles the system prompt with the phrase pools the assistant
//! draws from for greetings, farewells, spoken error recovery, and the
//! short acknowledgments used to mask completion latency on long inputs.

use std::path::Path;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A persona defines how the assistant sounds and behaves
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Persona {
    /// Display name
    pub name: String,

    /// System prompt establishing personality and speaking style
    pub system_prompt: String,

    /// Spoken once at startup (one chosen at random)
    pub greetings: Vec<String>,

    /// Spoken once after an exit phrase is detected
    pub farewells: Vec<String>,

    /// Spoken when a turn stage fails and the turn is recovered
    pub fallbacks: Vec<String>,

    /// Short interjections spoken before completing long inputs;
    /// empty disables the behavior
    pub acknowledgments: Vec<String>,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Lyra".to_string(),
            system_prompt: "You are Lyra, a cheerful and friendly voice assistant. \
                            Reply conversationally in one or two short sentences, \
                            as the reply will be spoken aloud. Ask a question back \
                            now and then to keep the conversation flowing, and avoid \
                            repeating yourself."
                .to_string(),
            greetings: vec![
                "Hi there! I'm Lyra. What would you like to talk about?".to_string(),
                "Hey! Lyra here, ready to chat whenever you are.".to_string(),
            ],
            farewells: vec![
                "Bye for now! Come talk to me again soon.".to_string(),
                "Thanks for chatting with me. See you next time!".to_string(),
            ],
            fallbacks: vec![
                "Sorry, I didn't catch that. Could you say it again?".to_string(),
                "Hmm, something went wrong on my end. Let's try that once more.".to_string(),
                "I missed that one. One more time?".to_string(),
            ],
            acknowledgments: vec![
                "Mhm.".to_string(),
                "Got it.".to_string(),
                "Okay, let me think.".to_string(),
            ],
        }
    }
}

impl Persona {
    /// Load a persona from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read persona {}: {e}", path.display()))
        })?;
        let persona: Self = toml::from_str(&content)?;
        tracing::debug!(name = %persona.name, path = %path.display(), "loaded persona");
        Ok(persona)
    }

    /// Pick a random greeting, if any
    #[must_use]
    pub fn greeting(&self) -> Option<&str> {
        pick(&self.greetings)
    }

    /// Pick a random farewell, if any
    #[must_use]
    pub fn farewell(&self) -> Option<&str> {
        pick(&self.farewells)
    }

    /// Pick a random fallback phrase, if any
    #[must_use]
    pub fn fallback(&self) -> Option<&str> {
        pick(&self.fallbacks)
    }

    /// Pick a random acknowledgment, if any
    #[must_use]
    pub fn acknowledgment(&self) -> Option<&str> {
        pick(&self.acknowledgments)
    }
}

fn pick(pool: &[String]) -> Option<&str> {
    pool.choose(&mut rand::thread_rng()).map(String::as_str)
}
