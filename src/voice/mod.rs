//! Voice processing module
//!
//! Handles audio capture, wake word detection, command recording, speech
//! recognition, synthesis and playback. The dialogue core only sees the
//! [`Speaker`] and [`Transcriber`] traits.

mod capture;
mod playback;
mod recorder;
mod speaker;
mod stt;
mod tts;
mod wake_word;

use async_trait::async_trait;

use crate::Result;

pub use capture::{AudioCapture, SAMPLE_RATE, pcm16, samples_to_wav};
pub use playback::AudioPlayback;
pub use recorder::{CommandRecorder, RecorderSettings, RecordingStatus, mean_amplitude};
pub use speaker::{ConsoleSpeaker, VoiceSpeaker};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use wake_word::{DetectorState, WakeWordDetector, energy_threshold};

/// Says things out loud; returns once the text has been delivered
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Speak `text`, blocking until playback completes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Turns recorded audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV bytes; failures and silence yield an empty string
    async fn transcribe(&self, wav: &[u8]) -> String;
}
