//! Voice Activity Detection
//!
//! One thread per analysed stream samples the most recent window at a fixed
//! cadence and flags the speaker while the mean spectrum level stays above a
//! threshold.

mod analyser;
mod detector;

pub use analyser::{MAX_DECIBELS, MIN_DECIBELS, SpectrumAnalyser};
pub use detector::{DetectorHandle, spawn_detector};

use std::time::Duration;

pub const DEFAULT_THRESHOLD: f32 = 20.0;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Detector tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VadSettings {
    /// Mean byte level (0-255) above which the speaker is flagged.
    pub threshold: f32,
    /// Time between two analysis windows.
    pub interval: Duration,
    /// Samples per window; a power of two.
    pub fft_size: usize,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            interval: DEFAULT_INTERVAL,
            fft_size: DEFAULT_FFT_SIZE,
        }
    }
}
