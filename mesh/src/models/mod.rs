//! Room Data Model
//!
//! Participants, the roster snapshot, stream tagging, and the shared media
//! handles that flow between capture devices, peer links and analysis.

mod participant;
mod speaker;
mod stream;

pub use participant::{Participant, PeerId, Roster};
pub use speaker::SpeakerKey;
pub use stream::{MediaStream, MediaTrack, StreamKind, StreamTag, TrackKind};

/// Generates a short random identifier such as `link-3f9a01c2`.
pub(crate) fn generate_id(prefix: &str) -> String {
    let random: u32 = rand::random();
    format!("{}-{:08x}", prefix, random)
}
