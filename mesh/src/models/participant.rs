//! Participants and the roster snapshot.

use std::collections::HashMap;

/// Identity assigned by the peer link primitive when the local endpoint opens.
pub type PeerId = String;

/// A room member as announced on the signaling channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Participant {
    pub peer_id: PeerId,
    /// User supplied, not unique.
    pub display_name: String,
}

impl Participant {
    pub fn new(peer_id: impl Into<PeerId>, display_name: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Local copy of the room membership.
///
/// Always replaced as a whole from a roster broadcast, never patched. A
/// broadcast listing the same peer twice keeps the last entry.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    members: HashMap<PeerId, Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_members(members: Vec<Participant>) -> Self {
        let members = members
            .into_iter()
            .map(|p| (p.peer_id.clone(), p))
            .collect();
        Self { members }
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.members.contains_key(peer_id)
    }

    pub fn get(&self, peer_id: &str) -> Option<&Participant> {
        self.members.get(peer_id)
    }

    pub fn display_name(&self, peer_id: &str) -> Option<&str> {
        self.members.get(peer_id).map(|p| p.display_name.as_str())
    }

    pub fn remove(&mut self, peer_id: &str) -> Option<Participant> {
        self.members.remove(peer_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.members.values()
    }

    /// Peers listed here but absent from `next`.
    pub fn departed_in<'a>(&'a self, next: &'a Roster) -> impl Iterator<Item = &'a PeerId> + 'a {
        self.members.keys().filter(move |id| !next.contains(id.as_str()))
    }

    /// Members sorted by display name then peer id, for stable presentation.
    pub fn sorted(&self) -> Vec<Participant> {
        let mut members: Vec<Participant> = self.members.values().cloned().collect();
        members.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.peer_id.cmp(&b.peer_id))
        });
        members
    }
}
