//! Peer link primitive contract.
//!
//! A peer link is a negotiated point-to-point media connection. The primitive
//! behind it (offer/answer, ICE, codecs) is a black box; the session only
//! originates links, accepts incoming ones, and reacts to the events the
//! primitive posts through a [`LinkEventSink`].

mod table;

pub(crate) use table::{Channel, Completion, LinkTable};

use crate::models::{MediaStream, PeerId, StreamTag};
use crate::session::SessionEvent;
use std::fmt;
use std::sync::mpsc::Sender;

pub type LinkId = String;

/// Which side originated the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkDirection {
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// `originate` was called before `open` succeeded.
    NotOpen,
    /// The remote peer id is not reachable through this primitive.
    UnknownPeer(PeerId),
    /// Offer/answer or connectivity checks failed.
    Negotiation(String),
    /// The link was already closed.
    Closed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::NotOpen => write!(f, "Local peer endpoint is not open"),
            LinkError::UnknownPeer(id) => write!(f, "Unknown peer: {}", id),
            LinkError::Negotiation(msg) => write!(f, "Negotiation failed: {}", msg),
            LinkError::Closed => write!(f, "Link already closed"),
        }
    }
}

impl std::error::Error for LinkError {}

/// One end of a peer link.
pub trait PeerLink: Send {
    /// Identifier shared by both ends of the link.
    fn id(&self) -> &LinkId;

    fn remote_peer(&self) -> &PeerId;

    fn direction(&self) -> LinkDirection;

    /// Metadata the originating side attached.
    fn tag(&self) -> &StreamTag;

    /// Answers an incoming link, optionally sending local media back.
    fn accept(&mut self, local: Option<MediaStream>) -> Result<(), LinkError>;

    /// Closes the link. Idempotent; the remote end receives `LinkEvent::Closed`.
    fn close(&mut self);
}

/// Factory side of the primitive: local identity, origination, incoming links.
pub trait PeerLinkFactory: Send {
    /// Opens the local endpoint and returns the peer id it was assigned.
    /// Incoming links and per-link events are posted to `events` from then on.
    fn open(&mut self, events: LinkEventSink) -> Result<PeerId, LinkError>;

    /// Starts negotiating a link to `remote` carrying `local` media.
    ///
    /// Returning `Ok` does not mean the link is up: completion is signalled by
    /// `LinkEvent::RemoteStream`, failure by `LinkEvent::Failed`.
    fn originate(
        &mut self,
        remote: &PeerId,
        local: Option<MediaStream>,
        tag: StreamTag,
    ) -> Result<Box<dyn PeerLink>, LinkError>;

    /// Releases the local endpoint. No events are posted afterwards.
    fn shutdown(&mut self);
}

/// Events posted by the peer link primitive.
pub enum LinkEvent {
    /// A remote peer originated a link to us.
    Incoming(Box<dyn PeerLink>),
    /// Negotiation completed and the remote side's media is available.
    RemoteStream { link_id: LinkId, stream: MediaStream },
    /// Negotiation or connectivity failed.
    Failed { link_id: LinkId, reason: String },
    /// The remote side closed the link.
    Closed { link_id: LinkId },
}

impl fmt::Debug for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Incoming(link) => f
                .debug_struct("Incoming")
                .field("link_id", link.id())
                .field("remote_peer", link.remote_peer())
                .field("tag", link.tag())
                .finish(),
            LinkEvent::RemoteStream { link_id, stream } => f
                .debug_struct("RemoteStream")
                .field("link_id", link_id)
                .field("stream", &stream.id())
                .finish(),
            LinkEvent::Failed { link_id, reason } => f
                .debug_struct("Failed")
                .field("link_id", link_id)
                .field("reason", reason)
                .finish(),
            LinkEvent::Closed { link_id } => {
                f.debug_struct("Closed").field("link_id", link_id).finish()
            }
        }
    }
}

/// Where a primitive posts [`LinkEvent`]s; feeds the owning session's queue.
#[derive(Clone)]
pub struct LinkEventSink {
    tx: Sender<SessionEvent>,
}

impl LinkEventSink {
    pub(crate) fn new(tx: Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Posts an event. Returns `false` once the session is gone.
    pub fn send(&self, event: LinkEvent) -> bool {
        self.tx.send(SessionEvent::Link(event)).is_ok()
    }
}
