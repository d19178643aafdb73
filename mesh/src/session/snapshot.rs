//! Observable session state.

use crate::error::SessionError;
use crate::models::{Participant, PeerId, SpeakerKey};
use crate::notify::LogEntry;
use crate::signaling::TransportStatus;
use std::sync::mpsc::Sender;

/// State change pushed to the observer channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Joined {
        room: String,
        peer_id: PeerId,
    },
    /// Current roster, sorted by display name.
    RosterChanged(Vec<Participant>),
    SpeakingChanged {
        key: SpeakerKey,
        speaking: bool,
    },
    VoiceAdded {
        peer_id: PeerId,
        display_name: String,
    },
    VoiceRemoved {
        peer_id: PeerId,
    },
    ScreenAdded {
        source_name: String,
    },
    ScreenRemoved {
        source_name: String,
    },
    LogAppended(LogEntry),
    MuteChanged(bool),
    SharingChanged(bool),
    TransportChanged(TransportStatus),
    Left,
    CommandFailed {
        command: &'static str,
        error: SessionError,
    },
}

/// Point-in-time copy of everything a presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub room: Option<String>,
    pub display_name: Option<String>,
    pub local_peer_id: Option<PeerId>,
    pub participants: Vec<Participant>,
    pub speaking: Vec<(SpeakerKey, bool)>,
    pub shared_screens: Vec<String>,
    /// `(peer id, announced name)` of every playing remote voice.
    pub remote_voices: Vec<(PeerId, String)>,
    pub muted: bool,
    pub sharing: bool,
    pub transport: TransportStatus,
    pub voice_links: usize,
    pub screen_links: usize,
    pub event_log: Vec<LogEntry>,
}

/// Optional update channel. Send failures mean nobody listens any more.
#[derive(Default)]
pub(crate) struct Observer {
    tx: Option<Sender<SessionUpdate>>,
}

impl Observer {
    pub fn set(&mut self, tx: Sender<SessionUpdate>) {
        self.tx = Some(tx);
    }

    pub fn emit(&self, update: SessionUpdate) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(update);
        }
    }
}
