//! Signaling channel contract.
//!
//! The out-of-band channel carries room membership: each member announces
//! itself once, and the channel broadcasts the full roster (plus join/leave
//! narration) to every member of the room. Roster snapshots may be
//! redelivered at any time.

use crate::models::{Participant, PeerId};
use crate::session::SessionEvent;
use std::fmt;
use std::sync::mpsc::Sender;

/// Connection state of the signaling transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TransportStatus {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStatus::Disconnected => write!(f, "disconnected"),
            TransportStatus::Connected => write!(f, "connected"),
            TransportStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// `announce` before `connect`, or after the transport dropped.
    NotConnected,
    /// The transport could not be reached.
    Unreachable(String),
    /// The relay refused a message.
    Rejected(String),
}

impl fmt::Display for SignalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalingError::NotConnected => write!(f, "Signaling channel not connected"),
            SignalingError::Unreachable(msg) => write!(f, "Signaling unreachable: {}", msg),
            SignalingError::Rejected(msg) => write!(f, "Signaling rejected message: {}", msg),
        }
    }
}

impl std::error::Error for SignalingError {}

/// The self-description sent once after connecting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announcement {
    pub display_name: String,
    pub room: String,
    pub peer_id: PeerId,
}

/// Events delivered by the signaling channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalEvent {
    StatusChanged(TransportStatus),
    /// Full membership of the room, self included.
    RosterUpdated(Vec<Participant>),
    PeerJoined { display_name: String },
    PeerLeft { display_name: String, peer_id: PeerId },
}

/// Where a signaling channel posts [`SignalEvent`]s.
#[derive(Clone)]
pub struct SignalEventSink {
    tx: Sender<SessionEvent>,
}

impl SignalEventSink {
    pub(crate) fn new(tx: Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Posts an event. Returns `false` once the session is gone.
    pub fn send(&self, event: SignalEvent) -> bool {
        self.tx.send(SessionEvent::Signal(event)).is_ok()
    }
}

/// Out-of-band room membership transport.
pub trait SignalingChannel: Send {
    /// Connects to the room. Events flow into `events` until `disconnect`.
    fn connect(&mut self, room: &str, events: SignalEventSink) -> Result<(), SignalingError>;

    fn announce(&mut self, announcement: &Announcement) -> Result<(), SignalingError>;

    /// Leaves the room. Idempotent.
    fn disconnect(&mut self);
}
