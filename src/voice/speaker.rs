//! Speaker implementations

use async_trait::async_trait;

use super::{AudioPlayback, Speaker, TextToSpeech};
use crate::{Error, Result};

/// Prints replies to stdout; used by the text chat loop
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSpeaker;

#[async_trait]
impl Speaker for ConsoleSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        tracing::debug!(text, "speaking");
        println!("mico> {text}");
        Ok(())
    }
}

/// Synthesizes replies and plays them on the default output device
pub struct VoiceSpeaker {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

impl VoiceSpeaker {
    #[must_use]
    pub const fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self { tts, playback }
    }
}

#[async_trait]
impl Speaker for VoiceSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        tracing::info!(text, "speaking");
        let audio = self.tts.synthesize(text).await?;

        let playback = self.playback.clone();
        tokio::task::spawn_blocking(move || playback.play_mp3_blocking(&audio))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}
