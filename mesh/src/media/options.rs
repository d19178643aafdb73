//! Capture options passed to `join`.

use std::fmt;
use std::str::FromStr;

/// Microphone capture quality preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AudioQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl AudioQuality {
    /// Requested capture sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioQuality::Low => 16_000,
            AudioQuality::Medium => 24_000,
            AudioQuality::High => 48_000,
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioQuality::Low => write!(f, "low"),
            AudioQuality::Medium => write!(f, "medium"),
            AudioQuality::High => write!(f, "high"),
        }
    }
}

impl FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(AudioQuality::Low),
            "medium" => Ok(AudioQuality::Medium),
            "high" => Ok(AudioQuality::High),
            other => Err(format!("unknown audio quality '{}'", other)),
        }
    }
}

/// Microphone processing options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MediaOptions {
    pub noise_cancellation: bool,
    pub echo_cancellation: bool,
    pub audio_quality: AudioQuality,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            noise_cancellation: true,
            echo_cancellation: true,
            audio_quality: AudioQuality::High,
        }
    }
}
