//! Link table owned by the session.
//!
//! One slot per (remote peer, channel). A slot holds at most one established
//! link plus any links still negotiating for the same key, which happens when
//! both peers originate to each other at the same time.
//!
//! When two voice links between the same pair both complete, each end keeps
//! the one originated by the lower peer id and closes the other. Both ends
//! apply the same rule, so they settle on the same physical link.

use super::{LinkDirection, LinkId, PeerLink};
use crate::models::{PeerId, StreamTag};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Channel {
    Voice,
    /// Our screen share going to a peer.
    ScreenOut,
    /// A peer's screen share coming to us.
    ScreenIn,
}

#[derive(Default)]
struct Slot {
    established: Option<Box<dyn PeerLink>>,
    negotiating: Vec<Box<dyn PeerLink>>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.established.is_none() && self.negotiating.is_empty()
    }

    fn close_all(&mut self) -> Vec<LinkId> {
        let mut closed = Vec::new();
        if let Some(mut link) = self.established.take() {
            link.close();
            closed.push(link.id().clone());
        }
        for mut link in self.negotiating.drain(..) {
            link.close();
            closed.push(link.id().clone());
        }
        closed
    }
}

/// Result of a negotiation completing.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Completion {
    /// The slot had no established link; this one is now it.
    Established { peer_id: PeerId, channel: Channel },
    /// This link is preferred over the established one, which was closed.
    Replaced {
        peer_id: PeerId,
        channel: Channel,
        previous: LinkId,
    },
    /// An established link is kept; this one was closed.
    Redundant { peer_id: PeerId, channel: Channel },
    /// The link is already the established one for its slot.
    AlreadyEstablished,
    /// Not in the table (closed, replaced, or never ours).
    Unknown,
}

/// Link that left the table without being closed by us.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Removed {
    pub peer_id: PeerId,
    pub channel: Channel,
    pub was_established: bool,
}

pub(crate) struct LinkTable {
    local_peer: PeerId,
    slots: HashMap<(PeerId, Channel), Slot>,
    index: HashMap<LinkId, (PeerId, Channel)>,
}

impl LinkTable {
    pub fn new(local_peer: PeerId) -> Self {
        Self {
            local_peer,
            slots: HashMap::new(),
            index: HashMap::new(),
        }
    }

    /// Whether any link, established or negotiating, exists for the key.
    pub fn has_slot(&self, peer_id: &str, channel: Channel) -> bool {
        self.slots.contains_key(&(peer_id.to_string(), channel))
    }

    pub fn is_established(&self, peer_id: &str, channel: Channel) -> bool {
        self.slots
            .get(&(peer_id.to_string(), channel))
            .is_some_and(|slot| slot.established.is_some())
    }

    pub fn established_link_id(&self, peer_id: &str, channel: Channel) -> Option<&LinkId> {
        self.slots
            .get(&(peer_id.to_string(), channel))
            .and_then(|slot| slot.established.as_ref())
            .map(|link| link.id())
    }

    /// Key of a link currently in the table.
    pub fn lookup(&self, link_id: &str) -> Option<&(PeerId, Channel)> {
        self.index.get(link_id)
    }

    /// Tag of a link currently in the table.
    pub fn link_tag(&self, link_id: &str) -> Option<&StreamTag> {
        let slot = self.slots.get(self.index.get(link_id)?)?;
        slot.established
            .iter()
            .chain(slot.negotiating.iter())
            .find(|link| link.id() == link_id)
            .map(|link| link.tag())
    }

    /// Whether `candidate` would win against the slot's established link.
    /// True when nothing is established.
    pub fn would_prefer(&self, channel: Channel, candidate: &dyn PeerLink) -> bool {
        match self
            .slots
            .get(&(candidate.remote_peer().clone(), channel))
            .and_then(|slot| slot.established.as_ref())
        {
            Some(current) => self.is_preferred(candidate, current.as_ref()),
            None => true,
        }
    }

    pub fn insert_negotiating(&mut self, channel: Channel, link: Box<dyn PeerLink>) {
        let key = (link.remote_peer().clone(), channel);
        self.index.insert(link.id().clone(), key.clone());
        self.slots.entry(key).or_default().negotiating.push(link);
    }

    /// Inserts a link that needs no completion signal (our outbound screen
    /// share). Any previous link in the slot is closed.
    pub fn insert_established(&mut self, channel: Channel, link: Box<dyn PeerLink>) {
        let key = (link.remote_peer().clone(), channel);
        if let Some(mut slot) = self.slots.remove(&key) {
            for id in slot.close_all() {
                self.index.remove(&id);
            }
        }
        self.index.insert(link.id().clone(), key.clone());
        self.slots.insert(
            key,
            Slot {
                established: Some(link),
                negotiating: Vec::new(),
            },
        );
    }

    /// Records that negotiation of `link_id` completed.
    pub fn complete(&mut self, link_id: &str) -> Completion {
        let Some(key) = self.index.get(link_id).cloned() else {
            return Completion::Unknown;
        };
        let Some(slot) = self.slots.get_mut(&key) else {
            self.index.remove(link_id);
            return Completion::Unknown;
        };

        let Some(position) = slot.negotiating.iter().position(|l| l.id() == link_id) else {
            return Completion::AlreadyEstablished;
        };
        let mut link = slot.negotiating.remove(position);
        let (peer_id, channel) = key;

        let Some(current) = slot.established.take() else {
            slot.established = Some(link);
            return Completion::Established { peer_id, channel };
        };

        // First completion wins unless the pair's preferred link arrives
        // later; both ends then settle on the same physical link
        if Self::originator_of(&self.local_peer, link.as_ref())
            < Self::originator_of(&self.local_peer, current.as_ref())
        {
            let mut current = current;
            let previous = current.id().clone();
            current.close();
            self.index.remove(&previous);
            slot.established = Some(link);
            Completion::Replaced {
                peer_id,
                channel,
                previous,
            }
        } else {
            slot.established = Some(current);
            link.close();
            self.index.remove(link_id);
            Completion::Redundant { peer_id, channel }
        }
    }

    /// Drops a link that failed or was closed by the remote side.
    pub fn remove(&mut self, link_id: &str) -> Option<Removed> {
        let key = self.index.remove(link_id)?;
        let slot = self.slots.get_mut(&key)?;

        let was_established = slot
            .established
            .as_ref()
            .is_some_and(|link| link.id() == link_id);
        if was_established {
            if let Some(mut link) = slot.established.take() {
                link.close();
            }
        } else if let Some(position) = slot.negotiating.iter().position(|l| l.id() == link_id) {
            slot.negotiating.remove(position).close();
        }

        if slot.is_empty() {
            self.slots.remove(&key);
        }
        let (peer_id, channel) = key;
        Some(Removed {
            peer_id,
            channel,
            was_established,
        })
    }

    /// Closes every link in one slot. Returns whether anything was established.
    pub fn close_slot(&mut self, peer_id: &str, channel: Channel) -> bool {
        let Some(mut slot) = self.slots.remove(&(peer_id.to_string(), channel)) else {
            return false;
        };
        let was_established = slot.established.is_some();
        for id in slot.close_all() {
            self.index.remove(&id);
        }
        was_established
    }

    /// Closes every link to `peer_id`, all channels.
    pub fn close_peer(&mut self, peer_id: &str) -> Vec<Channel> {
        let channels: Vec<Channel> = self
            .slots
            .keys()
            .filter(|(id, _)| id == peer_id)
            .map(|(_, channel)| *channel)
            .collect();
        for channel in &channels {
            self.close_slot(peer_id, *channel);
        }
        channels
    }

    /// Closes every link of one channel. Returns the peers affected.
    pub fn close_channel(&mut self, channel: Channel) -> Vec<PeerId> {
        let peers: Vec<PeerId> = self
            .slots
            .keys()
            .filter(|(_, c)| *c == channel)
            .map(|(id, _)| id.clone())
            .collect();
        for peer in &peers {
            self.close_slot(peer, channel);
        }
        peers
    }

    pub fn close_all(&mut self) {
        for (_, mut slot) in self.slots.drain() {
            slot.close_all();
        }
        self.index.clear();
    }

    pub fn established_count(&self, channel: Channel) -> usize {
        self.slots
            .iter()
            .filter(|((_, c), slot)| *c == channel && slot.established.is_some())
            .count()
    }

    /// Every link held, established or negotiating.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn is_preferred(&self, candidate: &dyn PeerLink, current: &dyn PeerLink) -> bool {
        Self::originator_of(&self.local_peer, candidate)
            < Self::originator_of(&self.local_peer, current)
    }

    fn originator_of<'a>(local_peer: &'a PeerId, link: &'a dyn PeerLink) -> &'a PeerId {
        match link.direction() {
            LinkDirection::Outbound => local_peer,
            LinkDirection::Inbound => link.remote_peer(),
        }
    }
}
