//! # RoomMesh - full-mesh audio rooms
//!
//! Coordination engine for rooms where every participant holds a direct peer
//! link to every other participant. Signaling, the peer link primitive, media
//! capture and OS notifications are injected collaborators; this crate keeps
//! the mesh consistent with the room roster, classifies incoming streams as
//! voice or screen share, and derives who is speaking.
//!
//! ## Public API
//!
//! - **`MeshSession`** - owns one room membership; `join`, `toggle_mute`,
//!   `start_screen_share`, `stop_screen_share`, `leave`
//! - **`spawn_session` / `SessionHandle`** - drive a session from its own thread
//! - **`SessionUpdate`** - observable state changes for a presentation layer
//! - **`SignalingChannel`**, **`PeerLinkFactory`**, **`PeerLink`**,
//!   **`MediaDevices`**, **`NotificationSink`** - collaborator contracts
//! - **`LoopbackHub`**, **`SyntheticMedia`** - in-process reference collaborators
//! - **`MeshConfig`** - `roommesh.conf` settings
//!
//! ## Example
//!
//! ```no_run
//! use roommesh::{LoopbackHub, MeshConfig, MeshSession, SilentNotifications, SyntheticMedia};
//!
//! let config = MeshConfig::load();
//! let logger = config.build_logger().unwrap();
//! let hub = LoopbackHub::new(logger.clone());
//!
//! let mut session = MeshSession::new(
//!     config.clone(),
//!     logger,
//!     Box::new(SyntheticMedia::new()),
//!     Box::new(hub.links()),
//!     Box::new(hub.signaling()),
//!     Box::new(SilentNotifications),
//! );
//! session.join("Alice", "standup", config.media_options()).unwrap();
//! session.process_pending();
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod loopback;
pub mod media;
pub mod models;
pub mod notify;
pub mod session;
pub mod signaling;
pub mod vad;

pub use config::MeshConfig;
pub use error::SessionError;
pub use link::{
    LinkDirection, LinkError, LinkEvent, LinkEventSink, LinkId, PeerLink, PeerLinkFactory,
};
pub use loopback::{LoopbackHub, LoopbackLinks, LoopbackSignaling};
pub use media::{AudioQuality, MediaDevices, MediaError, MediaOptions, SyntheticMedia};
pub use models::{
    MediaStream, MediaTrack, Participant, PeerId, Roster, SpeakerKey, StreamKind, StreamTag,
    TrackKind,
};
pub use notify::{
    EventLog, LogEntry, NotificationPermission, NotificationSink, RoomNotifier,
    SilentNotifications,
};
pub use session::{
    MeshSession, SessionCommand, SessionHandle, SessionSnapshot, SessionUpdate, spawn_session,
};
pub use signaling::{
    Announcement, SignalEvent, SignalEventSink, SignalingChannel, SignalingError, TransportStatus,
};
pub use vad::VadSettings;
