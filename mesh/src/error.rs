//! Error types for session operations.

use crate::link::LinkError;
use crate::media::MediaError;
use crate::models::PeerId;
use crate::signaling::SignalingError;
use std::fmt;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised by [`MeshSession`](crate::MeshSession) operations.
///
/// Each error is local to the operation that raised it. A failed peer link
/// never blocks the rest of the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Microphone or screen capture refused; join or share aborted.
    MediaAccessDenied(String),

    /// A screen capture is already active.
    AlreadySharing,

    /// Negotiation with one peer failed. Retried on the next roster broadcast.
    LinkNegotiationFailed { peer_id: PeerId, reason: String },

    /// The signaling channel was lost or refused the announcement.
    TransportDisconnected(String),

    /// The operation needs a joined room.
    NotJoined,

    /// `join` was called while already in a room.
    AlreadyJoined,

    /// Empty display name or room.
    InvalidInput(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::MediaAccessDenied(msg) => write!(f, "Media access denied: {}", msg),
            SessionError::AlreadySharing => write!(f, "Screen share already active"),
            SessionError::LinkNegotiationFailed { peer_id, reason } => {
                write!(f, "Link negotiation with {} failed: {}", peer_id, reason)
            }
            SessionError::TransportDisconnected(msg) => {
                write!(f, "Signaling transport disconnected: {}", msg)
            }
            SessionError::NotJoined => write!(f, "Not in a room"),
            SessionError::AlreadyJoined => write!(f, "Already in a room"),
            SessionError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<MediaError> for SessionError {
    fn from(err: MediaError) -> Self {
        SessionError::MediaAccessDenied(err.to_string())
    }
}

impl From<SignalingError> for SessionError {
    fn from(err: SignalingError) -> Self {
        SessionError::TransportDisconnected(err.to_string())
    }
}

impl From<LinkError> for SessionError {
    fn from(err: LinkError) -> Self {
        let peer_id = match &err {
            LinkError::UnknownPeer(id) => id.clone(),
            _ => String::new(),
        };
        SessionError::LinkNegotiationFailed {
            peer_id,
            reason: err.to_string(),
        }
    }
}
