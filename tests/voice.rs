//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use beacon_dialogue::voice::{DetectorState, SAMPLE_RATE, UtteranceDetector, rms, samples_to_wav};
use std::io::Cursor;

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn test_detector_starts_idle() {
    let detector = UtteranceDetector::default();

    assert_eq!(detector.state(), DetectorState::Idle);
    assert!(!detector.is_speaking());
}

#[test]
fn test_speech_activity_detection() {
    let mut detector = UtteranceDetector::default();

    // Silent samples - should not trigger
    let state = detector.process(&generate_silence(0.1));
    assert_eq!(state, DetectorState::Idle);

    // Loud samples - should start an utterance
    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    assert_eq!(detector.process(&speech), DetectorState::Speaking);

    // More speech followed by silence completes it
    detector.process(&generate_sine_samples(440.0, 0.3, 0.3));
    let state = detector.process(&generate_silence(0.6));
    assert_eq!(state, DetectorState::Complete);
}

#[test]
fn test_short_pause_keeps_speaking() {
    let mut detector = UtteranceDetector::default();

    detector.process(&generate_sine_samples(440.0, 0.5, 0.3));
    detector.process(&generate_silence(0.2));
    assert!(detector.is_speaking());

    // Speech resets the silence counter
    detector.process(&generate_sine_samples(440.0, 0.2, 0.3));
    detector.process(&generate_silence(0.4));
    assert!(detector.is_speaking());
}

#[test]
fn test_custom_silence_window() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE as usize / 10);

    detector.process(&generate_sine_samples(440.0, 0.5, 0.3));
    let state = detector.process(&generate_silence(0.2));
    assert_eq!(state, DetectorState::Complete);
}

#[test]
fn test_take_utterance() {
    let mut detector = UtteranceDetector::default();

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    let silence = generate_silence(0.6);
    detector.process(&speech);
    detector.process(&silence);

    let utterance = detector.take_utterance();
    assert_eq!(utterance.len(), speech.len() + silence.len());
    assert_eq!(detector.state(), DetectorState::Idle);
    assert!(detector.take_utterance().is_empty());
}

#[test]
fn test_long_utterance_is_cut() {
    let mut detector = UtteranceDetector::default();

    let second = generate_sine_samples(440.0, 1.0, 0.3);
    let mut state = DetectorState::Idle;
    for _ in 0..31 {
        state = detector.process(&second);
        if state == DetectorState::Complete {
            break;
        }
    }

    assert_eq!(state, DetectorState::Complete);
}

#[test]
fn test_quiet_noise_is_not_speech() {
    let mut detector = UtteranceDetector::default();

    let hum = generate_sine_samples(60.0, 1.0, 0.01);
    assert!(rms(&hum) < 0.03);
    assert_eq!(detector.process(&hum), DetectorState::Idle);
}

#[test]
fn test_rms() {
    assert!(rms(&[]).abs() < f32::EPSILON);
    assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // Header plus two bytes per sample
    assert!(wav_data.len() >= 44 + samples.len() * 2);
}

#[test]
fn test_wav_readback() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples, vec![0, 16383, -16383, 32767, -32767, 8191]);
}
