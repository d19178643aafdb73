//! Byte-scaled magnitude spectrum.
//!
//! Follows the browser AnalyserNode conventions: Blackman window, forward FFT,
//! magnitude normalised by the window length, decibels mapped linearly from
//! `[MIN_DECIBELS, MAX_DECIBELS]` onto `0..=255`. No temporal smoothing, so a
//! silent window reads as zero immediately.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub const MIN_DECIBELS: f32 = -100.0;
pub const MAX_DECIBELS: f32 = -30.0;

pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    bins: Vec<u8>,
}

impl SpectrumAnalyser {
    /// `fft_size` is the number of samples per analysis window.
    pub fn new(fft_size: usize) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        Self {
            fft,
            window: blackman(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            bins: vec![0; fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Spectrum of `samples` as `fft_size / 2` bytes.
    ///
    /// `samples` shorter than the window are zero padded at the front.
    pub fn byte_frequency_data(&mut self, samples: &[f32]) -> &[u8] {
        let n = self.window.len();
        let offset = n.saturating_sub(samples.len());
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < offset { 0.0 } else { samples[i - offset] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 255.0 / (MAX_DECIBELS - MIN_DECIBELS);
        for (bin, value) in self.bins.iter_mut().zip(self.buffer.iter()) {
            let magnitude = value.norm() / n as f32;
            let db = 20.0 * magnitude.log10();
            let scaled = (scale * (db - MIN_DECIBELS)).clamp(0.0, 255.0);
            // NaN and -inf collapse to 0 here
            *bin = if scaled.is_finite() { scaled as u8 } else { 0 };
        }
        &self.bins
    }

    /// Mean of the byte spectrum; the value compared against the threshold.
    pub fn mean_level(&mut self, samples: &[f32]) -> f32 {
        let bins = self.byte_frequency_data(samples);
        if bins.is_empty() {
            return 0.0;
        }
        let total: u32 = bins.iter().map(|b| u32::from(*b)).sum();
        total as f32 / bins.len() as f32
    }
}

fn blackman(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let len = n as f32;
    (0..n)
        .map(|i| {
            let x = i as f32 / len;
            A0 - A1 * (2.0 * std::f32::consts::PI * x).cos()
                + A2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}
