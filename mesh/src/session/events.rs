use crate::link::LinkEvent;
use crate::media::MediaOptions;
use crate::models::SpeakerKey;
use crate::signaling::SignalEvent;

/// Commands accepted by a session running on its own thread.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Join {
        display_name: String,
        room: String,
        /// `None` uses the configured options.
        options: Option<MediaOptions>,
    },
    ToggleMute,
    StartScreenShare,
    StopScreenShare,
    Leave,
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::Join { .. } => "join",
            SessionCommand::ToggleMute => "toggle_mute",
            SessionCommand::StartScreenShare => "start_screen_share",
            SessionCommand::StopScreenShare => "stop_screen_share",
            SessionCommand::Leave => "leave",
        }
    }
}

/// Everything that reaches the session queue.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Link(LinkEvent),
    Signal(SignalEvent),
    Speaking {
        key: SpeakerKey,
        detector_id: u64,
        speaking: bool,
    },
    /// A local screen capture track ended, by us or by the platform.
    ScreenCaptureEnded { stream_id: String },
    Command(SessionCommand),
    Shutdown,
}
