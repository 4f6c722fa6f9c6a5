//! Wake word detection
//!
//! Local energy gating finds candidate speech segments; a transcript of the
//! segment confirms the wake phrase.

use crate::{Error, Result};

/// Energy threshold at the middle sensitivity (0.5)
const BASE_ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to trigger (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// State of the wake word detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Detected potential speech, accumulating
    Listening,
    /// Wake word confirmed
    Activated,
}

/// Detects wake words in audio
pub struct WakeWordDetector {
    wake_words: Vec<String>,
    threshold: f32,
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

/// RMS energy threshold for a sensitivity in `0.0..=1.0`
///
/// Higher sensitivity lowers the threshold, so quieter speech triggers.
#[must_use]
pub fn energy_threshold(sensitivity: f32) -> f32 {
    BASE_ENERGY_THRESHOLD * (1.5 - sensitivity.clamp(0.0, 1.0))
}

impl WakeWordDetector {
    /// Create a new wake word detector
    ///
    /// # Arguments
    ///
    /// * `wake_words` - List of wake words to detect (e.g., "hey mico")
    /// * `sensitivity` - `0.0..=1.0`, higher triggers on quieter speech
    ///
    /// # Errors
    ///
    /// Returns error if no usable wake word is given
    pub fn new(wake_words: Vec<String>, sensitivity: f32) -> Result<Self> {
        let normalized: Vec<String> = wake_words
            .into_iter()
            .map(|w| w.to_lowercase().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        if normalized.is_empty() {
            return Err(Error::WakeWord("at least one wake word is required".to_string()));
        }

        let threshold = energy_threshold(sensitivity);
        tracing::debug!(wake_words = ?normalized, threshold, "wake word detector initialized");

        Ok(Self {
            wake_words: normalized,
            threshold,
            state: DetectorState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        })
    }

    /// Process audio samples and detect speech activity
    ///
    /// Returns true once a speech segment followed by silence is buffered
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                }
            }
            DetectorState::Listening => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                // Enough speech followed by silence
                if self.silence_counter > SILENCE_SAMPLES
                    && self.speech_buffer.len() > MIN_SPEECH_SAMPLES
                {
                    tracing::debug!(
                        samples = self.speech_buffer.len(),
                        "speech segment complete"
                    );
                    return true;
                }

                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("timeout - resetting");
                    self.reset();
                }
            }
            DetectorState::Activated => {}
        }

        false
    }

    /// Check if transcribed text contains a wake word
    ///
    /// Call this after STT to verify wake word presence
    pub fn check_wake_word(&mut self, transcript: &str) -> bool {
        let normalized = transcript.to_lowercase();

        for wake_word in &self.wake_words {
            if normalized.contains(wake_word) {
                tracing::info!(wake_word, transcript, "wake word detected");
                self.state = DetectorState::Activated;
                return true;
            }
        }

        self.reset();
        false
    }

    /// Take the speech buffer, clearing it
    pub fn take_speech_buffer(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech_buffer)
    }

    /// Check if the wake word was detected
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.state == DetectorState::Activated
    }

    /// Check if currently listening for potential wake word
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == DetectorState::Listening
    }

    /// Reset detector to idle state
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Get the configured wake words
    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }

    /// Energy threshold in use
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Text spoken after the first wake word in a transcript
    #[must_use]
    pub fn command_after_wake_word(&self, transcript: &str) -> String {
        let lower = transcript.to_lowercase();

        self.wake_words
            .iter()
            .find_map(|w| lower.find(w.as_str()).map(|pos| pos + w.len()))
            .and_then(|end| transcript.get(end..))
            .map_or_else(
                || transcript.trim().to_string(),
                |rest| {
                    rest.trim_start_matches(|c: char| {
                        c.is_whitespace() || c == ',' || c == '.' || c == '!'
                    })
                    .trim_end()
                    .to_string()
                },
            )
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);
    }

    #[test]
    fn test_sensitivity_threshold() {
        assert!((energy_threshold(0.5) - 0.03).abs() < 1e-6);
        assert!(energy_threshold(0.9) < energy_threshold(0.3));
        assert!((energy_threshold(7.0) - energy_threshold(1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_requires_wake_word() {
        assert!(WakeWordDetector::new(vec!["  ".to_string()], 0.7).is_err());
    }

    #[test]
    fn test_command_after_wake_word() {
        let detector = WakeWordDetector::new(vec!["hey mico".to_string()], 0.7).unwrap();

        assert_eq!(
            detector.command_after_wake_word("Hey Mico, what's on my list?"),
            "what's on my list?"
        );
        assert_eq!(detector.command_after_wake_word("Hey Mico."), "");
    }
}
