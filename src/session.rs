//! Turn orchestration
//!
//! Drives the listen → normalize → complete → synthesize/cache → play cycle.
//! Failures inside a turn never end the session: each stage recovers locally
//! (spoken fallback, skipped playback) and the loop returns to idle. Only an
//! exit phrase or a startup failure ends the loop.

use std::sync::Arc;

use crate::adapters::{AudioSink, ChatCompletion, SpeechInput, SpeechOutput};
use crate::cache::{CacheKey, ResponseCache};
use crate::config::{ACKNOWLEDGMENT_THRESHOLD, Config};
use crate::persona::Persona;
use crate::text::normalize;
use crate::Result;

/// Stage of the turn pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    /// Between turns
    Idle,
    /// Waiting for the user to speak
    Listening,
    /// Cleaning up recognized text and checking for exit intent
    Normalizing,
    /// Waiting for the chat completion
    Completing,
    /// Synthesizing the reply (or serving it from cache)
    Synthesizing,
    /// Playing the reply
    Playing,
    /// Session over; terminal
    Exit,
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnOutcome {
    /// All stages ran to completion
    Completed,
    /// A stage failed and was recovered locally
    #[default]
    RecoveredError,
    /// The user asked to exit
    ExitRequested,
}

/// Record of one listen → respond cycle
///
/// Fields fill in as stages complete; a turn that ends early keeps the
/// default [`TurnOutcome::RecoveredError`].
#[derive(Debug, Default)]
pub struct Turn {
    /// Text as recognized
    pub raw_input: String,
    /// Recognized text after normalization
    pub normalized_input: String,
    /// Chat reply as returned
    pub reply_text: String,
    /// Chat reply after normalization (what was actually spoken)
    pub normalized_reply: String,
    /// Audio played for the reply, if any
    pub audio_ref: Option<Arc<Vec<u8>>>,
    /// How the turn ended
    pub outcome: TurnOutcome,
}

/// A running assistant session
///
/// Owns the response cache and all adapters; constructed once at startup
/// and driven by [`Session::run`] until an exit phrase or a fatal startup
/// error.
pub struct Session {
    config: Config,
    persona: Persona,
    input: Box<dyn SpeechInput>,
    chat: Box<dyn ChatCompletion>,
    synth: Box<dyn SpeechOutput>,
    sink: Box<dyn AudioSink>,
    cache: ResponseCache,
    stage: TurnStage,
    active: bool,
    turn_count: u64,
}

impl Session {
    /// Create a session from configuration and adapters
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the cache cannot
    /// create its backing directory
    pub fn new(
        config: Config,
        persona: Persona,
        input: Box<dyn SpeechInput>,
        chat: Box<dyn ChatCompletion>,
        synth: Box<dyn SpeechOutput>,
        sink: Box<dyn AudioSink>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = ResponseCache::new(config.cache_max_entries)?;

        Ok(Self {
            config,
            persona,
            input,
            chat,
            synth,
            sink,
            cache,
            stage: TurnStage::Idle,
            active: false,
            turn_count: 0,
        })
    }

    /// Number of turns entered so far
    #[must_use]
    pub const fn turn_count(&self) -> u64 {
        self.turn_count
    }

    /// Current pipeline stage
    #[must_use]
    pub const fn stage(&self) -> TurnStage {
        self.stage
    }

    /// Run the session until an exit phrase is heard
    ///
    /// # Errors
    ///
    /// Returns error only for startup-fatal conditions (ambient noise
    /// calibration failure); nothing that happens inside a turn propagates
    pub async fn run(&mut self) -> Result<()> {
        // No turn can proceed without a usable input channel
        self.input.calibrate().await?;

        if let Some(greeting) = self.persona.greeting().map(ToString::to_string) {
            self.say(&greeting).await;
        }

        self.active = true;
        while self.active {
            let turn = self.run_turn().await;
            if turn.outcome == TurnOutcome::ExitRequested {
                tracing::info!(turns = self.turn_count, "exit requested");
                self.active = false;
            }
        }

        if let Some(farewell) = self.persona.farewell().map(ToString::to_string) {
            self.say(&farewell).await;
        }

        self.cache.clear().await;
        Ok(())
    }

    /// Run one turn of the conversation
    ///
    /// Every entered turn increments the turn counter and ends back at
    /// [`TurnStage::Idle`], except an exit request which ends at
    /// [`TurnStage::Exit`].
    pub async fn run_turn(&mut self) -> Turn {
        self.turn_count += 1;
        let mut turn = Turn::default();

        self.enter(TurnStage::Listening);
        let raw = match self
            .input
            .listen(self.config.listen_timeout, self.config.phrase_limit)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(stage = "listening", error = %e, "turn recovered");
                self.speak_fallback().await;
                return self.finish(turn);
            }
        };
        turn.raw_input = raw;

        self.enter(TurnStage::Normalizing);
        turn.normalized_input = normalize(&turn.raw_input);
        if turn.normalized_input.is_empty() {
            tracing::warn!(stage = "normalizing", "nothing usable recognized");
            self.speak_fallback().await;
            return self.finish(turn);
        }
        if self.config.is_exit_phrase(&turn.normalized_input) {
            turn.outcome = TurnOutcome::ExitRequested;
            self.enter(TurnStage::Exit);
            return turn;
        }
        tracing::info!(input = %turn.normalized_input, "heard");

        // Mask completion latency on long inputs with a short interjection
        if turn.normalized_input.chars().count() > ACKNOWLEDGMENT_THRESHOLD
            && let Some(ack) = self.persona.acknowledgment().map(ToString::to_string)
        {
            self.say(&ack).await;
        }

        self.enter(TurnStage::Completing);
        turn.reply_text = match self.chat.complete(&turn.normalized_input).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(stage = "completing", error = %e, "turn recovered");
                self.speak_fallback().await;
                return self.finish(turn);
            }
        };

        turn.normalized_reply = normalize(&turn.reply_text);
        if turn.normalized_reply.is_empty() {
            tracing::debug!("empty reply after normalization, nothing to speak");
            turn.outcome = TurnOutcome::Completed;
            return self.finish(turn);
        }
        tracing::info!(reply = %turn.normalized_reply, "replying");

        self.enter(TurnStage::Synthesizing);
        let audio = match self.fetch_audio(&turn.normalized_reply).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(stage = "synthesizing", error = %e, "skipping playback");
                return self.finish(turn);
            }
        };
        turn.audio_ref = Some(Arc::clone(&audio));

        self.enter(TurnStage::Playing);
        if let Err(e) = self.sink.play(&audio).await {
            tracing::warn!(stage = "playing", error = %e, "playback failed");
            return self.finish(turn);
        }

        turn.outcome = TurnOutcome::Completed;
        self.finish(turn)
    }

    /// Synthesize a phrase through the cache
    async fn fetch_audio(&self, normalized_text: &str) -> Result<Arc<Vec<u8>>> {
        let key = CacheKey::derive(normalized_text, &self.config.voice, &self.config.language);

        let synth = self.synth.as_ref();
        let voice = self.config.voice.as_str();
        let language = self.config.language.as_str();

        self.cache
            .fetch(key, || synth.synthesize(normalized_text, voice, language))
            .await
    }

    /// Speak a phrase, logging instead of failing
    ///
    /// Used for greeting, farewell, fallback, and acknowledgment phrases,
    /// where a failure should never affect the turn or the session.
    async fn say(&mut self, text: &str) {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return;
        }

        match self.fetch_audio(&normalized).await {
            Ok(audio) => {
                if let Err(e) = self.sink.play(&audio).await {
                    tracing::warn!(error = %e, "failed to play phrase");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to synthesize phrase"),
        }
    }

    /// Speak a random fallback phrase from the persona
    async fn speak_fallback(&mut self) {
        if let Some(phrase) = self.persona.fallback().map(ToString::to_string) {
            self.say(&phrase).await;
        }
    }

    fn enter(&mut self, stage: TurnStage) {
        tracing::trace!(from = ?self.stage, to = ?stage, "stage transition");
        self.stage = stage;
    }

    /// Loop back to idle, returning the finished turn
    fn finish(&mut self, turn: Turn) -> Turn {
        self.enter(TurnStage::Idle);
        turn
    }
}
