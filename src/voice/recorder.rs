//! Amplitude-gated command recording
//!
//! Audio is judged in fixed chunks by mean absolute 16-bit amplitude. Only
//! loud chunks are kept. Recording ends after enough quiet chunks follow
//! speech, or gives up when no speech starts within the wait limit.

use std::time::Duration;

use super::capture::pcm16;

/// Length of one analysis chunk
const CHUNK_DURATION: Duration = Duration::from_millis(500);

/// Recorder thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecorderSettings {
    /// Mean absolute amplitude (16-bit scale) above which a chunk is speech
    pub silence_threshold: f32,
    /// Quiet time after speech that ends the command
    pub silence_duration: Duration,
    /// How long to wait for speech to begin
    pub no_speech_limit: Duration,
    /// Hard cap on a single command
    pub max_duration: Duration,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            silence_threshold: 200.0,
            silence_duration: Duration::from_secs(1),
            no_speech_limit: Duration::from_secs(8),
            max_duration: Duration::from_secs(30),
        }
    }
}

/// Where a recording stands after new audio
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingStatus {
    /// No speech yet
    Waiting,
    /// Speech started, still going
    Recording,
    /// Speech followed by silence; the captured command
    Complete(Vec<f32>),
    /// Nobody spoke within the wait limit
    NoSpeech,
}

/// Records one spoken command from a stream of samples
#[derive(Debug)]
pub struct CommandRecorder {
    settings: RecorderSettings,
    chunk_samples: usize,
    pending: Vec<f32>,
    recorded: Vec<f32>,
    speaking: bool,
    silent_chunks: usize,
    waited_chunks: usize,
    total_chunks: usize,
}

impl CommandRecorder {
    #[must_use]
    pub fn new(settings: RecorderSettings, sample_rate: u32) -> Self {
        let chunk_samples = samples_for(CHUNK_DURATION, sample_rate).max(1);

        Self {
            settings,
            chunk_samples,
            pending: Vec::with_capacity(chunk_samples),
            recorded: Vec::new(),
            speaking: false,
            silent_chunks: 0,
            waited_chunks: 0,
            total_chunks: 0,
        }
    }

    /// Feed captured samples
    ///
    /// After `Complete` or `NoSpeech` the recorder resets itself for the next
    /// command.
    pub fn push(&mut self, samples: &[f32]) -> RecordingStatus {
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= self.chunk_samples {
            let chunk: Vec<f32> = self.pending.drain(..self.chunk_samples).collect();
            if let Some(done) = self.process_chunk(&chunk) {
                self.reset();
                return done;
            }
        }

        if self.speaking {
            RecordingStatus::Recording
        } else {
            RecordingStatus::Waiting
        }
    }

    fn process_chunk(&mut self, chunk: &[f32]) -> Option<RecordingStatus> {
        self.total_chunks += 1;
        let volume = mean_amplitude(chunk);

        if volume > self.settings.silence_threshold {
            if !self.speaking {
                tracing::trace!(volume, "speech started");
            }
            self.speaking = true;
            self.silent_chunks = 0;
            self.recorded.extend_from_slice(chunk);
        } else if self.speaking {
            self.silent_chunks += 1;
        } else {
            self.waited_chunks += 1;
        }

        if self.speaking && self.silent_chunks >= self.chunks_for(self.settings.silence_duration) {
            tracing::debug!(samples = self.recorded.len(), "silence detected, command complete");
            return Some(RecordingStatus::Complete(std::mem::take(&mut self.recorded)));
        }

        if self.speaking && self.total_chunks >= self.chunks_for(self.settings.max_duration) {
            tracing::debug!(samples = self.recorded.len(), "command length cap reached");
            return Some(RecordingStatus::Complete(std::mem::take(&mut self.recorded)));
        }

        if !self.speaking && self.waited_chunks >= self.chunks_for(self.settings.no_speech_limit) {
            tracing::debug!("no speech before wait limit");
            return Some(RecordingStatus::NoSpeech);
        }

        None
    }

    fn chunks_for(&self, duration: Duration) -> usize {
        let chunk_ms = CHUNK_DURATION.as_millis().max(1);
        let chunks = duration.as_millis().div_ceil(chunk_ms);
        usize::try_from(chunks).unwrap_or(usize::MAX).max(1)
    }

    /// Drop any partial recording
    pub fn reset(&mut self) {
        self.pending.clear();
        self.recorded.clear();
        self.speaking = false;
        self.silent_chunks = 0;
        self.waited_chunks = 0;
        self.total_chunks = 0;
    }

    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.speaking
    }
}

/// Mean absolute amplitude of f32 samples on the 16-bit integer scale
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_amplitude(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|&s| f32::from(pcm16(s)).abs()).sum();
    sum / samples.len() as f32
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)) as usize
}
