//! Room event log and OS notifications.

mod event_log;
mod notifier;

pub use event_log::{EventLog, LogEntry};
pub use notifier::RoomNotifier;

use std::fmt;

/// Answer of the OS notification facility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NotificationPermission {
    /// Not asked yet, or the prompt was dismissed.
    #[default]
    Default,
    Granted,
    Denied,
}

impl fmt::Display for NotificationPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationPermission::Default => write!(f, "default"),
            NotificationPermission::Granted => write!(f, "granted"),
            NotificationPermission::Denied => write!(f, "denied"),
        }
    }
}

/// OS notification facility.
pub trait NotificationSink: Send {
    fn permission(&self) -> NotificationPermission;

    /// Prompts the user. May block until answered.
    fn request_permission(&mut self) -> NotificationPermission;

    fn notify(&mut self, text: &str) -> Result<(), String>;
}

/// Sink for headless runs: never granted, never shows anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentNotifications;

impl NotificationSink for SilentNotifications {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn request_permission(&mut self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn notify(&mut self, _text: &str) -> Result<(), String> {
        Ok(())
    }
}
