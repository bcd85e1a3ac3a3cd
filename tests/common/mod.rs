//! Scripted fake adapters for orchestrator tests
//!
//! No audio hardware or network access involved: inputs come from a script,
//! synthesis returns the text bytes, and playback records what it was given.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lyra_assistant::adapters::{AudioSink, ChatCompletion, SpeechInput, SpeechOutput};
use lyra_assistant::{Error, Result};

/// Speech input that replays a script of listen results
///
/// An exhausted script returns "exit" so a forgotten exit phrase cannot hang
/// the test loop.
pub struct ScriptedInput {
    script: VecDeque<Result<String>>,
    fail_calibration: bool,
    pub listens: Arc<AtomicUsize>,
}

impl ScriptedInput {
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fail_calibration: false,
            listens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_failing_calibration() -> Self {
        Self {
            script: VecDeque::new(),
            fail_calibration: true,
            listens: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SpeechInput for ScriptedInput {
    async fn calibrate(&mut self) -> Result<()> {
        if self.fail_calibration {
            Err(Error::Audio("no input device available".to_string()))
        } else {
            Ok(())
        }
    }

    async fn listen(&mut self, _timeout: Duration, _phrase_limit: Duration) -> Result<String> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok("exit".to_string()))
    }
}

/// Chat completion that replays scripted replies, echoing once exhausted
pub struct ScriptedChat {
    replies: VecDeque<Result<String>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn echoing() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&mut self, message: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .pop_front()
            .unwrap_or_else(|| Ok(format!("you said {message}")))
    }
}

/// Synthesizer that returns the text bytes as "audio" and counts its calls
pub struct CountingSynth {
    fail: bool,
    pub calls: Arc<AtomicUsize>,
}

impl CountingSynth {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SpeechOutput for CountingSynth {
    async fn synthesize(&self, text: &str, _voice: &str, _language: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::Tts("synthesis backend down".to_string()))
        } else {
            Ok(text.as_bytes().to_vec())
        }
    }
}

/// Audio sink that records everything played through it
pub struct RecordingSink {
    pub played: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&mut self, audio: &[u8]) -> Result<()> {
        self.played.lock().unwrap().push(audio.to_vec());
        Ok(())
    }
}
