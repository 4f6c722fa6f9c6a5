//! Microphone capture
//!
//! Commands are judged and transcribed as 16 kHz mono. Devices that only
//! offer several channels at that rate are averaged down to one in the
//! callback, so everything downstream sees a single channel.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Shared between the cpal callback thread and the voice loop
type SampleBuffer = Arc<Mutex<Vec<f32>>>;

/// Owns the input stream; dropping it releases the device
pub struct AudioCapture {
    config: StreamConfig,
    buffer: SampleBuffer,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Pick a 16 kHz input configuration, preferring mono
    ///
    /// # Errors
    ///
    /// Returns error if no input device or 16 kHz configuration exists
    pub fn new() -> Result<Self> {
        let device = default_input()?;

        let range = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(supports_speech_rate)
            .min_by_key(SupportedStreamConfigRange::channels)
            .ok_or_else(|| Error::Audio(format!("microphone cannot record at {SAMPLE_RATE} Hz")))?;

        let config = range.with_sample_rate(SampleRate(SAMPLE_RATE)).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "microphone ready"
        );

        Ok(Self {
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Open the input stream; a no-op while already capturing
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be opened
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let channels = usize::from(self.config.channels);

        let stream = default_input()?
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        append_mono(&mut buf, data, channels);
                    }
                },
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::info!("microphone open");
        Ok(())
    }

    /// Close the input stream and forget buffered audio
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!("microphone closed");
        }
        self.clear_buffer();
    }

    /// Mono samples captured since the last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Discard buffered audio, e.g. the assistant's own voice after speaking
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn default_input() -> Result<cpal::Device> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))
}

fn supports_speech_rate(range: &SupportedStreamConfigRange) -> bool {
    range.min_sample_rate() <= SampleRate(SAMPLE_RATE)
        && range.max_sample_rate() >= SampleRate(SAMPLE_RATE)
}

/// Append interleaved frames to `out`, averaging each frame to one sample
#[allow(clippy::cast_precision_loss)]
fn append_mono(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// A float sample on the signed 16-bit PCM scale
///
/// Silence thresholds and WAV payloads both use this scale.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn pcm16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Encode mono samples as a 16-bit WAV file for STT uploads
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

    for &sample in samples {
        writer
            .write_sample(pcm16(sample))
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_frames_are_averaged() {
        let mut out = vec![0.25];
        append_mono(&mut out, &[0.5, 0.1, -0.2, 0.2, 1.0], 2);

        // The dangling half frame is dropped
        assert_eq!(out.len(), 3);
        assert!((out[1] - 0.3).abs() < 1e-6);
        assert!(out[2].abs() < 1e-6);
    }

    #[test]
    fn test_mono_passes_through() {
        let mut out = Vec::new();
        append_mono(&mut out, &[0.1, -0.1], 1);
        assert_eq!(out, vec![0.1, -0.1]);
    }

    #[test]
    fn test_pcm16_clamps() {
        assert_eq!(pcm16(0.0), 0);
        assert_eq!(pcm16(1.0), 32767);
        assert_eq!(pcm16(2.0), 32767);
        assert_eq!(pcm16(-2.0), -32768);
    }
}
