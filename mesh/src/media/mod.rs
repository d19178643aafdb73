//! Local media capture contract.
//!
//! Capture devices sit outside the mesh engine. The session asks for a
//! microphone stream on join and a screen stream on share; either request may
//! be refused by the user or the platform.

mod options;
mod synthetic;

pub use options::{AudioQuality, MediaOptions};
pub use synthetic::SyntheticMedia;

use crate::models::MediaStream;
use std::fmt;

/// Errors reported by capture devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The user or platform refused access.
    PermissionDenied(String),
    /// No usable device, or the device failed to start.
    DeviceUnavailable(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            MediaError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
        }
    }
}

impl std::error::Error for MediaError {}

/// Source of local capture streams.
///
/// Both calls may block until the user answers a permission prompt.
pub trait MediaDevices: Send {
    /// Opens the microphone with the given processing options.
    fn capture_microphone(&mut self, options: &MediaOptions) -> Result<MediaStream, MediaError>;

    /// Opens a screen capture. The returned stream's video track ends when
    /// the platform's own "stop sharing" control is used.
    fn capture_screen(&mut self) -> Result<MediaStream, MediaError>;
}
