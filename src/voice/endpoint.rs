//! Utterance endpointing
//!
//! Segments the capture stream into single utterances using energy-based
//! speech detection: a phrase starts when energy rises above the calibrated
//! threshold and ends after a pause of trailing silence.

use super::capture::rms;

/// Minimum duration of speech for a valid phrase (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Trailing silence that ends a phrase (in samples)
const PAUSE_SAMPLES: usize = 11200; // 0.7 seconds

/// State of the phrase detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseState {
    /// Waiting for speech to start
    Waiting,
    /// Speech detected, accumulating the phrase
    Capturing,
    /// Phrase complete (speech followed by a pause)
    Complete,
}

/// Detects one spoken phrase in a stream of audio chunks
pub struct PhraseDetector {
    threshold: f32,
    state: PhraseState,
    buffer: Vec<f32>,
    silence_counter: usize,
}

impl PhraseDetector {
    /// Create a detector with the given energy threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: PhraseState::Waiting,
            buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed captured samples; returns the state after processing
    pub fn process(&mut self, samples: &[f32]) -> PhraseState {
        if samples.is_empty() || self.state == PhraseState::Complete {
            return self.state;
        }

        let is_speech = rms(samples) > self.threshold;

        match self.state {
            PhraseState::Waiting => {
                if is_speech {
                    self.state = PhraseState::Capturing;
                    self.buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!("speech started");
                }
            }
            PhraseState::Capturing => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > PAUSE_SAMPLES {
                    // The buffer includes the trailing silence; it does not
                    // count toward the minimum speech length.
                    if self.buffer.len() - self.silence_counter > MIN_SPEECH_SAMPLES {
                        tracing::debug!(samples = self.buffer.len(), "phrase complete");
                        self.state = PhraseState::Complete;
                    } else {
                        // Too short to be speech; likely a noise blip
                        tracing::trace!("discarding short segment");
                        self.reset();
                    }
                }
            }
            PhraseState::Complete => {}
        }

        self.state
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> PhraseState {
        self.state
    }

    /// Number of samples accumulated so far
    #[must_use]
    pub const fn captured_len(&self) -> usize {
        self.buffer.len()
    }

    /// Take the captured phrase, resetting the detector
    pub fn take_phrase(&mut self) -> Vec<f32> {
        let phrase = std::mem::take(&mut self.buffer);
        self.reset();
        phrase
    }

    /// Reset to waiting for speech
    pub fn reset(&mut self) {
        self.state = PhraseState::Waiting;
        self.buffer.clear();
        self.silence_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f32> {
        vec![0.3; len]
    }

    fn silence(len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    #[test]
    fn silence_alone_never_starts_a_phrase() {
        let mut detector = PhraseDetector::new(0.03);
        assert_eq!(detector.process(&silence(16000)), PhraseState::Waiting);
        assert_eq!(detector.captured_len(), 0);
    }

    #[test]
    fn speech_then_pause_completes_phrase() {
        let mut detector = PhraseDetector::new(0.03);

        assert_eq!(detector.process(&tone(8000)), PhraseState::Capturing);
        assert_eq!(detector.process(&tone(4000)), PhraseState::Capturing);
        assert_eq!(detector.process(&silence(12000)), PhraseState::Complete);

        let phrase = detector.take_phrase();
        assert_eq!(phrase.len(), 8000 + 4000 + 12000);
        assert_eq!(detector.state(), PhraseState::Waiting);
    }

    #[test]
    fn short_blip_is_discarded() {
        let mut detector = PhraseDetector::new(0.03);

        detector.process(&tone(1000));
        assert_eq!(detector.state(), PhraseState::Capturing);

        // Pause arrives before enough speech accumulated
        assert_eq!(detector.process(&silence(12000)), PhraseState::Waiting);
        assert_eq!(detector.captured_len(), 0);
    }

    #[test]
    fn speech_resumes_across_brief_silence() {
        let mut detector = PhraseDetector::new(0.03);

        detector.process(&tone(8000));
        detector.process(&silence(4000)); // shorter than the pause threshold
        assert_eq!(detector.process(&tone(4000)), PhraseState::Capturing);
        assert_eq!(detector.process(&silence(12000)), PhraseState::Complete);
    }

    #[test]
    fn complete_state_is_sticky() {
        let mut detector = PhraseDetector::new(0.03);
        detector.process(&tone(8000));
        detector.process(&silence(12000));
        assert_eq!(detector.state(), PhraseState::Complete);

        // Further audio is ignored until the phrase is taken
        let len = detector.captured_len();
        detector.process(&tone(4000));
        assert_eq!(detector.captured_len(), len);
    }
}
