//! Utterance endpointing
//!
//! Energy-based detection of where a spoken reply starts and ends, so the
//! audio backend knows when to stop listening and send the segment to STT.

use super::capture::{SAMPLE_RATE, rms};

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to count as an utterance (0.3 seconds)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Default trailing silence that ends an utterance (0.5 seconds)
pub const DEFAULT_SILENCE_SAMPLES: usize = 8000;

/// Longest utterance kept before it is cut off (30 seconds)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 30;

/// State of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Speech started, accumulating
    Speaking,
    /// Speech followed by enough silence
    Complete,
}

/// Finds the boundaries of one spoken utterance
#[derive(Debug)]
pub struct UtteranceDetector {
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
    silence_samples: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_SAMPLES)
    }
}

impl UtteranceDetector {
    /// Create a detector that ends an utterance after `silence_samples` of quiet
    #[must_use]
    pub fn new(silence_samples: usize) -> Self {
        Self {
            state: DetectorState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
            silence_samples,
        }
    }

    /// Feed a block of samples, returning the state afterwards
    pub fn process(&mut self, samples: &[f32]) -> DetectorState {
        let energy = rms(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                }
            }
            DetectorState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > self.silence_samples {
                    if self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                        self.state = DetectorState::Complete;
                    } else {
                        // Too short to be speech, likely a click or a cough
                        tracing::trace!("blip discarded");
                        self.reset();
                    }
                } else if self.speech_buffer.len() > MAX_UTTERANCE_SAMPLES {
                    tracing::debug!("utterance cut at maximum length");
                    self.state = DetectorState::Complete;
                }
            }
            DetectorState::Complete => {}
        }

        self.state
    }

    /// Take the captured utterance and return to idle
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.speech_buffer);
        self.reset();
        samples
    }

    /// Return to idle, discarding any buffered speech
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Whether speech has started but not finished
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state == DetectorState::Speaking
    }
}
