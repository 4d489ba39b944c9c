//! Voice processing module
//!
//! Handles audio capture, utterance endpointing, and playback for the
//! audio speech backend.

mod capture;
mod detector;
mod playback;

pub use capture::{AudioCapture, SAMPLE_RATE, rms, samples_to_wav};
pub use detector::{DEFAULT_SILENCE_SAMPLES, DetectorState, UtteranceDetector};
pub use playback::AudioPlayback;
