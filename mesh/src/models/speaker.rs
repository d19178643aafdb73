use super::participant::PeerId;
use std::fmt;

/// Key of a speaking indicator: the local user or a remote peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpeakerKey {
    Local,
    Remote(PeerId),
}

impl SpeakerKey {
    pub fn peer_id(&self) -> Option<&str> {
        match self {
            SpeakerKey::Local => None,
            SpeakerKey::Remote(id) => Some(id),
        }
    }
}

impl fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerKey::Local => write!(f, "self"),
            SpeakerKey::Remote(id) => write!(f, "{}", id),
        }
    }
}
