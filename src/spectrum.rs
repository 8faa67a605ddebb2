//! Frequency-domain volume analysis for the vocal-energy band.
//!
//! The analyser the band thresholds were tuned against: a Blackman-windowed
//! FFT, per-bin exponential smoothing with a 0.8 time constant, and decibel
//! magnitudes clamped to \[-100, -30\] dB then scaled onto a 0-255 byte
//! range. The mean of the byte magnitudes is what the thresholds see.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex32;
use std::sync::Arc;

/// Decibel floor of the byte scale. At or below this, a bin reads 0.
const MIN_DECIBELS: f32 = -100.0;

/// Decibel ceiling of the byte scale. At or above this, a bin reads 255.
const MAX_DECIBELS: f32 = -30.0;

/// Streaming spectrum analyser over fixed-size sample windows.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn rustfft::Fft<f32>>,
    fft_size: usize,
    /// Exponential smoothing constant applied to linear magnitudes.
    smoothing: f32,
    window: Vec<f32>,
    /// Smoothed linear magnitudes, one per bin below Nyquist.
    magnitudes: Vec<f32>,
    /// Samples accumulated towards the next full window.
    pending: Vec<f32>,
    scratch: Vec<Complex32>,
}

impl SpectrumAnalyzer {
    /// Create an analyser for the given FFT size and smoothing constant.
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            window: blackman_window(fft_size),
            magnitudes: vec![0.0; fft_size / 2],
            pending: Vec::with_capacity(fft_size * 2),
            scratch: vec![Complex32::new(0.0, 0.0); fft_size],
        }
    }

    /// Feed captured samples into the analyser.
    ///
    /// Whole windows are consumed as they fill up. Returns the mean byte
    /// magnitude of the most recent processed window, or `None` if no
    /// window completed on this call.
    pub fn feed(&mut self, samples: &[f32]) -> Option<f32> {
        self.pending.extend_from_slice(samples);

        let mut mean = None;
        while self.pending.len() >= self.fft_size {
            let frame: Vec<f32> = self.pending.drain(..self.fft_size).collect();
            mean = Some(self.process_window(&frame));
        }
        mean
    }

    /// Run one window through the FFT and return the mean byte magnitude.
    fn process_window(&mut self, frame: &[f32]) -> f32 {
        for (slot, (sample, w)) in self
            .scratch
            .iter_mut()
            .zip(frame.iter().zip(self.window.iter()))
        {
            *slot = Complex32::new(sample * w, 0.0);
        }

        self.fft.process(&mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let alpha = self.smoothing;
        for (smoothed, bin) in self.magnitudes.iter_mut().zip(self.scratch.iter()) {
            let mag = (bin.re * bin.re + bin.im * bin.im).sqrt() * norm;
            *smoothed = alpha * *smoothed + (1.0 - alpha) * mag;
        }

        let sum: u32 = self
            .magnitudes
            .iter()
            .map(|m| u32::from(byte_magnitude(*m)))
            .sum();
        sum as f32 / self.magnitudes.len() as f32
    }

    /// Reset smoothing state and discard pending samples.
    pub fn reset(&mut self) {
        self.magnitudes.fill(0.0);
        self.pending.clear();
    }
}

/// Convert a linear magnitude to the 0–255 byte scale via decibels.
fn byte_magnitude(magnitude: f32) -> u8 {
    let db = 20.0 * magnitude.max(f32::MIN_POSITIVE).log10();
    byte_from_db(db)
}

/// Map a decibel value onto the 0–255 byte range, clamped at the rails.
fn byte_from_db(db: f32) -> u8 {
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

/// Standard Blackman window of length `n`.
fn blackman_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / denom;
            0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
        })
        .collect()
}
