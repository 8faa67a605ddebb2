//! Microphone audio capture using cpal.
//!
//! Captures at the device's native sample rate, downsamples to the
//! configured rate, and fans chunks out on a broadcast channel so the
//! volume analyser and an active dictation session share one device
//! stream.

use crate::config::AudioConfig;
use crate::error::{EmpaError, Result};
use crate::sensor::messages::AudioChunk;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Broadcast capacity for audio chunks. Slow subscribers lag and skip
/// rather than stall the capture callback.
pub const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Audio capture from the system microphone via cpal.
pub struct MicCapture {
    device: cpal::Device,
    stream_config: StreamConfig,
    /// The target sample rate for downstream consumers (e.g., 16kHz).
    target_sample_rate: u32,
}

impl MicCapture {
    /// Create a new capture instance.
    ///
    /// Uses the device's default configuration for maximum compatibility,
    /// then downsamples to the target rate in software.
    ///
    /// # Errors
    ///
    /// Returns an error if no input device is available.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.input_device {
            host.input_devices()
                .map_err(|e| EmpaError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| EmpaError::Audio(format!("input device '{name}' not found")))?
        } else {
            host.default_input_device()
                .ok_or_else(|| EmpaError::Audio("no default input device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using input device: {device_name}");

        let default_config = device
            .default_input_config()
            .map_err(|e| EmpaError::Audio(format!("no default input config: {e}")))?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels();

        let stream_config = StreamConfig {
            channels: native_channels,
            sample_rate: native_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            "native input config: {}Hz, {} channels",
            native_rate, native_channels
        );

        Ok(Self {
            device,
            stream_config,
            target_sample_rate: config.input_sample_rate,
        })
    }

    /// Run the capture loop, broadcasting audio chunks to all subscribers.
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if the audio stream cannot be created.
    pub async fn run(
        &self,
        tx: broadcast::Sender<AudioChunk>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let native_rate = self.stream_config.sample_rate;
        let native_channels = self.stream_config.channels;
        let target_rate = self.target_sample_rate;

        let stream = self
            .device
            .build_input_stream(
                &self.stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mono = if native_channels > 1 {
                        to_mono(data, native_channels)
                    } else {
                        data.to_vec()
                    };

                    let samples = if native_rate != target_rate {
                        downsample(&mono, native_rate, target_rate)
                    } else {
                        mono
                    };

                    let chunk = AudioChunk {
                        samples,
                        sample_rate: target_rate,
                        captured_at: Instant::now(),
                    };
                    // Broadcast send never blocks the audio thread; it only
                    // fails when nobody is subscribed, which is fine.
                    let _ = tx.send(chunk);
                },
                move |err| {
                    error!("audio input stream error: {err}");
                },
                None,
            )
            .map_err(|e| EmpaError::Audio(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| EmpaError::Audio(format!("failed to start input stream: {e}")))?;

        info!(
            "audio capture started: native {}Hz -> target {}Hz",
            native_rate, target_rate
        );

        // Hold the stream alive until cancelled
        cancel.cancelled().await;

        drop(stream);
        info!("audio capture stopped");
        Ok(())
    }
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Simple linear-interpolation downsampler.
///
/// Sufficient for volume analysis and speech transcription; the energy of
/// interest sits well below the Nyquist rate at 16kHz.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples[idx.min(samples.len() - 1)] as f64
        };

        output.push(sample as f32);
    }

    output
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn to_mono_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5, 0.0, 1.0];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn downsample_halves_length_for_2x_ratio() {
        let samples: Vec<f32> = (0..480).map(|i| i as f32).collect();
        let out = downsample(&samples, 48_000, 16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn downsample_is_identity_for_matching_rates() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(downsample(&samples, 16_000, 16_000), samples);
    }
}
