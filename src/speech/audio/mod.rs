//! Microphone and speaker speech backend
//!
//! LISTEN captures from the default input device until an utterance ends
//! (or the no-input window passes), then transcribes it. SPEAK synthesizes
//! the utterance and plays it on the default output device.

mod stt;
mod tts;

use std::time::{Duration, Instant};

pub use stt::SpeechToText;
pub use tts::TextToSpeech;

use super::{EventSink, SpeechBackend, SpeechEvent};
use crate::config::SpeechConfig;
use crate::voice::{
    AudioCapture, AudioPlayback, DEFAULT_SILENCE_SAMPLES, DetectorState, SAMPLE_RATE,
    UtteranceDetector, samples_to_wav,
};
use crate::{Error, Result};

/// How often captured audio is drained into the detector
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Audio-device speech backend
pub struct AudioBackend {
    no_input_timeout: Duration,
    silence_samples: usize,
    stt: SpeechToText,
    tts: TextToSpeech,
    capture: Option<AudioCapture>,
    playback: Option<AudioPlayback>,
}

impl AudioBackend {
    /// Create an audio backend; devices are opened in `prepare`
    #[must_use]
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            no_input_timeout: config.no_input_timeout,
            silence_samples: silence_samples(config.complete_timeout),
            stt: SpeechToText::new(
                config.stt_url.clone(),
                config.stt_model.clone(),
                &config.locale,
                config.api_key.clone(),
            ),
            tts: TextToSpeech::new(
                config.tts_url.clone(),
                config.tts_model.clone(),
                config.voice.clone(),
                config.tts_speed,
                config.api_key.clone(),
            ),
            capture: None,
            playback: None,
        }
    }

    /// Capture one utterance; `None` if the no-input window passed in silence
    fn capture_utterance(&mut self) -> Result<Option<Vec<f32>>> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| Error::Speech("audio backend not prepared".to_string()))?;

        let mut detector = UtteranceDetector::new(self.silence_samples);
        capture.clear_buffer();
        capture.start()?;

        let started = Instant::now();
        let utterance = loop {
            std::thread::sleep(POLL_INTERVAL);

            match detector.process(&capture.take_buffer()) {
                DetectorState::Complete => break Some(detector.take_utterance()),
                DetectorState::Idle if started.elapsed() >= self.no_input_timeout => break None,
                _ => {}
            }
        };

        capture.stop();
        Ok(utterance)
    }
}

/// Trailing-silence window in samples; zero means the detector default
fn silence_samples(complete_timeout: Duration) -> usize {
    if complete_timeout.is_zero() {
        return DEFAULT_SILENCE_SAMPLES;
    }
    let samples = complete_timeout.as_millis() * u128::from(SAMPLE_RATE) / 1000;
    usize::try_from(samples).unwrap_or(usize::MAX)
}

impl SpeechBackend for AudioBackend {
    fn prepare(&mut self) -> Result<()> {
        if self.capture.is_none() {
            self.capture = Some(AudioCapture::new()?);
        }
        if self.playback.is_none() {
            self.playback = Some(AudioPlayback::new()?);
        }
        tracing::info!("audio backend ready");
        Ok(())
    }

    fn listen(&mut self, sink: &EventSink) -> Result<()> {
        let Some(samples) = self.capture_utterance()? else {
            tracing::debug!("no speech before timeout");
            sink.emit(SpeechEvent::NoInput);
            return Ok(());
        };

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        match self.stt.transcribe(wav)? {
            Some(hypothesis) => sink.emit(SpeechEvent::Recognised(vec![hypothesis])),
            None => sink.emit(SpeechEvent::NoInput),
        }
        Ok(())
    }

    fn speak(&mut self, utterance: &str) -> Result<()> {
        let playback = self
            .playback
            .as_ref()
            .ok_or_else(|| Error::Speech("audio backend not prepared".to_string()))?;

        tracing::debug!(text = utterance, "speaking");
        let audio = self.tts.synthesize(utterance)?;
        playback.play_mp3(&audio)
    }
}
