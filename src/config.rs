//! Runtime configuration

use std::time::Duration;

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::{Error, Result};

/// Default exit phrases, matched case-insensitively against normalized input
pub const DEFAULT_EXIT_PHRASES: &[&str] = &["exit", "quit", "bye"];

/// Inputs longer than this (in characters, after normalization) get a spoken
/// acknowledgment before the completion call
pub const ACKNOWLEDGMENT_THRESHOLD: usize = 20;

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Language tag passed to recognition and synthesis (e.g. "en", "th")
    pub language: String,

    /// Voice identifier passed to synthesis
    pub voice: String,

    /// Exit phrases ending the session, stored lowercase
    pub exit_phrases: Vec<String>,

    /// Maximum number of cached synthesized responses
    pub cache_max_entries: usize,

    /// How long to wait for speech before treating the turn as silent
    pub listen_timeout: Duration,

    /// Maximum length of a single captured phrase
    pub phrase_limit: Duration,

    /// Gemini API key (from `GEMINI_API_KEY`)
    pub gemini_api_key: String,

    /// Chat model identifier
    pub chat_model: String,
}

impl Config {
    /// Validate startup requirements
    ///
    /// # Errors
    ///
    /// Returns error if a required credential is missing or a bound is unusable
    pub fn validate(&self) -> Result<()> {
        if self.gemini_api_key.is_empty() {
            return Err(Error::Config(
                "GEMINI_API_KEY environment variable not set".to_string(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(Error::Config("cache size must be at least 1".to_string()));
        }
        if self.exit_phrases.is_empty() {
            return Err(Error::Config("at least one exit phrase required".to_string()));
        }
        Ok(())
    }

    /// Whether normalized input requests an exit
    ///
    /// Exact match, case-insensitive; the input is expected to already be
    /// normalized and is trimmed here.
    #[must_use]
    pub fn is_exit_phrase(&self, normalized_input: &str) -> bool {
        let input = normalized_input.trim().to_lowercase();
        self.exit_phrases.iter().any(|p| *p == input)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            voice: "default".to_string(),
            exit_phrases: DEFAULT_EXIT_PHRASES.iter().map(ToString::to_string).collect(),
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            listen_timeout: Duration::from_secs(8),
            phrase_limit: Duration::from_secs(15),
            gemini_api_key: String::new(),
            chat_model: "gemini-2.0-flash".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn exit_phrase_matching_is_case_insensitive() {
        let config = Config::default();
        for phrase in ["exit", "EXIT", "Quit", "bYe", "  bye  "] {
            assert!(config.is_exit_phrase(phrase), "{phrase:?} should exit");
        }
    }

    #[test]
    fn exit_requires_exact_match() {
        let config = Config::default();
        assert!(!config.is_exit_phrase("bye the way"));
        assert!(!config.is_exit_phrase("do not quit"));
        assert!(!config.is_exit_phrase(""));
    }

    #[test]
    fn missing_api_key_fails_validation() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            gemini_api_key: "key".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}
