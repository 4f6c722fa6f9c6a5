//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use mico_assistant::voice::{
    CommandRecorder, DetectorState, RecorderSettings, RecordingStatus, SAMPLE_RATE,
    WakeWordDetector, samples_to_wav,
};
use std::io::Cursor;
use std::time::Duration;

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

fn detector(words: &[&str]) -> WakeWordDetector {
    WakeWordDetector::new(words.iter().map(ToString::to_string).collect(), 0.5).unwrap()
}

#[test]
fn test_wake_word_detector_creation() {
    let detector = detector(&["hey mico"]);

    assert_eq!(detector.state(), DetectorState::Idle);
    assert_eq!(detector.wake_words(), &["hey mico"]);
    assert!(!detector.is_activated());
    assert!(!detector.is_listening());
}

#[test]
fn test_wake_word_normalization() {
    let detector = detector(&["  Hey MICO  ", "HELLO", ""]);

    // Lowercased, trimmed, blanks dropped
    assert_eq!(detector.wake_words(), &["hey mico", "hello"]);
}

#[test]
fn test_wake_word_check() {
    let mut detector = detector(&["hey mico"]);

    // No wake word
    assert!(!detector.check_wake_word("hello world"));
    assert_eq!(detector.state(), DetectorState::Idle);

    // Wake word present
    assert!(detector.check_wake_word("Hey Mico, what time is it?"));
    assert_eq!(detector.state(), DetectorState::Activated);
    assert_eq!(
        detector.command_after_wake_word("Hey Mico, what time is it?"),
        "what time is it?"
    );
}

#[test]
fn test_wake_word_case_insensitive() {
    let mut detector = detector(&["hey mico"]);

    assert!(detector.check_wake_word("HEY MICO"));
    detector.reset();

    assert!(detector.check_wake_word("HeY mIcO"));
    detector.reset();
    assert_eq!(detector.state(), DetectorState::Idle);
}

#[test]
fn test_speech_activity_detection() {
    let mut detector = detector(&["mico"]);

    // Silent samples - should not trigger
    let silence = generate_silence(0.1);
    assert!(!detector.process(&silence));
    assert_eq!(detector.state(), DetectorState::Idle);

    // Loud samples - should start listening
    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    detector.process(&speech);
    assert!(detector.is_listening());

    let more_speech = generate_sine_samples(440.0, 0.3, 0.3);
    assert!(!detector.process(&more_speech));

    // Speech followed by silence completes the segment
    assert!(detector.process(&generate_silence(0.6)));

    let segment = detector.take_speech_buffer();
    assert_eq!(segment.len(), speech.len() + more_speech.len() + 9600);
}

#[test]
fn test_sensitivity_changes_trigger_level() {
    // RMS of a 0.03 amplitude sine is about 0.021
    let quiet = generate_sine_samples(440.0, 0.1, 0.03);

    let mut sensitive = WakeWordDetector::new(vec!["mico".into()], 1.0).unwrap();
    sensitive.process(&quiet);
    assert!(sensitive.is_listening());

    let mut deaf = WakeWordDetector::new(vec!["mico".into()], 0.0).unwrap();
    deaf.process(&quiet);
    assert_eq!(deaf.state(), DetectorState::Idle);
}

#[test]
fn test_recorder_captures_command_between_silences() {
    let settings = RecorderSettings {
        silence_threshold: 200.0,
        silence_duration: Duration::from_secs(1),
        no_speech_limit: Duration::from_secs(8),
        max_duration: Duration::from_secs(30),
    };
    let mut recorder = CommandRecorder::new(settings, SAMPLE_RATE);

    assert_eq!(recorder.push(&generate_silence(0.5)), RecordingStatus::Waiting);
    assert_eq!(
        recorder.push(&generate_sine_samples(300.0, 1.0, 0.2)),
        RecordingStatus::Recording
    );

    match recorder.push(&generate_silence(1.0)) {
        RecordingStatus::Complete(samples) => {
            assert_eq!(samples.len(), SAMPLE_RATE as usize);
            let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();
            assert_eq!(&wav[0..4], b"RIFF");
        }
        other => panic!("expected a complete command, got {other:?}"),
    }
}

#[test]
fn test_recorder_gives_up_in_silence() {
    let settings = RecorderSettings {
        no_speech_limit: Duration::from_secs(2),
        ..RecorderSettings::default()
    };
    let mut recorder = CommandRecorder::new(settings, SAMPLE_RATE);

    assert_eq!(recorder.push(&generate_silence(1.5)), RecordingStatus::Waiting);
    assert_eq!(recorder.push(&generate_silence(0.5)), RecordingStatus::NoSpeech);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV should have reasonable size
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
    assert_eq!(read_samples[3], 32767);
}
