//! In-process capture device.
//!
//! Hands out writable streams instead of opening hardware, with scriptable
//! permission answers. Clones share state, so a caller can keep one clone to
//! feed samples into the streams a session captured, or to flip permissions.

use super::{MediaDevices, MediaError, MediaOptions};
use crate::models::{MediaStream, MediaTrack, TrackKind};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct SyntheticState {
    microphone_denied: bool,
    screen_denied: bool,
    last_options: Option<MediaOptions>,
    microphones: Vec<MediaStream>,
    screens: Vec<MediaStream>,
}

#[derive(Clone, Default)]
pub struct SyntheticMedia {
    state: Arc<Mutex<SyntheticState>>,
}

impl SyntheticMedia {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SyntheticState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_microphone_allowed(&self, allowed: bool) {
        self.state().microphone_denied = !allowed;
    }

    pub fn set_screen_allowed(&self, allowed: bool) {
        self.state().screen_denied = !allowed;
    }

    /// Options of the most recent microphone request.
    pub fn last_options(&self) -> Option<MediaOptions> {
        self.state().last_options
    }

    /// Most recently captured microphone stream.
    pub fn microphone(&self) -> Option<MediaStream> {
        self.state().microphones.last().cloned()
    }

    /// Most recently captured screen stream.
    pub fn screen(&self) -> Option<MediaStream> {
        self.state().screens.last().cloned()
    }

    /// Number of captures (microphone and screen) not yet released.
    pub fn live_captures(&self) -> usize {
        let state = self.state();
        state
            .microphones
            .iter()
            .chain(state.screens.iter())
            .filter(|s| s.is_active())
            .count()
    }
}

impl MediaDevices for SyntheticMedia {
    fn capture_microphone(&mut self, options: &MediaOptions) -> Result<MediaStream, MediaError> {
        let mut state = self.state();
        state.last_options = Some(*options);
        if state.microphone_denied {
            return Err(MediaError::PermissionDenied(
                "microphone access refused".to_string(),
            ));
        }
        let stream = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio)]);
        state.microphones.push(stream.clone());
        Ok(stream)
    }

    fn capture_screen(&mut self) -> Result<MediaStream, MediaError> {
        let mut state = self.state();
        if state.screen_denied {
            return Err(MediaError::PermissionDenied(
                "screen capture refused".to_string(),
            ));
        }
        let stream = MediaStream::new(vec![MediaTrack::new(TrackKind::Video)]);
        state.screens.push(stream.clone());
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::AudioQuality;

    #[test]
    fn test_microphone_capture_records_options() {
        let handle = SyntheticMedia::new();
        let mut device = handle.clone();
        let options = MediaOptions {
            noise_cancellation: false,
            echo_cancellation: true,
            audio_quality: AudioQuality::Low,
        };

        let stream = device.capture_microphone(&options).unwrap();

        assert_eq!(handle.last_options(), Some(options));
        assert!(handle.microphone().unwrap().same_as(&stream));
        assert_eq!(stream.audio_tracks().count(), 1);
    }

    #[test]
    fn test_denied_permissions() {
        let handle = SyntheticMedia::new();
        let mut device = handle.clone();
        handle.set_microphone_allowed(false);
        handle.set_screen_allowed(false);

        assert!(matches!(
            device.capture_microphone(&MediaOptions::default()),
            Err(MediaError::PermissionDenied(_))
        ));
        assert!(matches!(
            device.capture_screen(),
            Err(MediaError::PermissionDenied(_))
        ));
        assert_eq!(handle.live_captures(), 0);
    }

    #[test]
    fn test_live_captures_drop_when_stopped() {
        let handle = SyntheticMedia::new();
        let mut device = handle.clone();

        let mic = device.capture_microphone(&MediaOptions::default()).unwrap();
        let screen = device.capture_screen().unwrap();
        assert_eq!(handle.live_captures(), 2);

        screen.stop();
        assert_eq!(handle.live_captures(), 1);
        mic.stop();
        assert_eq!(handle.live_captures(), 0);
    }
}
