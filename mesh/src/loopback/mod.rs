//! In-process signaling relay and peer link primitive.
//!
//! Connects any number of sessions living in one process. Signaling behaves
//! like the room relay: every announce or departure broadcasts the full
//! roster of the room, plus join/leave narration to the other members. Links
//! hand the caller's stream object straight to the callee, so a track muted
//! or ended on one side is silent or ended on the other.
//!
//! Test hooks simulate the failure modes a real transport has: unreachable
//! peers, a signaling connection dropping, and roster redelivery.

mod links;
mod signaling;

pub use links::{LoopbackLink, LoopbackLinks};
pub use signaling::LoopbackSignaling;

use crate::link::{LinkEvent, LinkEventSink, LinkId};
use crate::models::{MediaStream, Participant, PeerId};
use crate::signaling::{SignalEvent, SignalEventSink, TransportStatus};
use logging::Logger;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

struct Member {
    room: String,
    sink: SignalEventSink,
    participant: Option<Participant>,
    connected: bool,
}

struct LinkRecord {
    caller: PeerId,
    callee: PeerId,
    caller_stream: Option<MediaStream>,
}

#[derive(Default)]
struct HubState {
    members: HashMap<u64, Member>,
    next_member: u64,
    endpoints: HashMap<PeerId, LinkEventSink>,
    unreachable: HashSet<PeerId>,
    links: HashMap<LinkId, LinkRecord>,
}

impl HubState {
    fn roster(&self, room: &str) -> Vec<Participant> {
        self.members
            .values()
            .filter(|m| m.room == room)
            .filter_map(|m| m.participant.clone())
            .collect()
    }

    /// Sends `event` to every connected member of `room` except `skip`.
    fn broadcast(&self, room: &str, skip: Option<u64>, event: &SignalEvent) {
        for (id, member) in &self.members {
            if member.room == room && member.connected && Some(*id) != skip {
                member.sink.send(event.clone());
            }
        }
    }

    fn broadcast_roster(&self, room: &str) {
        let roster = self.roster(room);
        self.broadcast(room, None, &SignalEvent::RosterUpdated(roster));
    }

    /// Removes a member and tells the rest of the room.
    fn depart(&mut self, member_id: u64) -> Option<Participant> {
        let member = self.members.remove(&member_id)?;
        let participant = member.participant?;
        self.broadcast_roster(&member.room);
        self.broadcast(
            &member.room,
            None,
            &SignalEvent::PeerLeft {
                display_name: participant.display_name.clone(),
                peer_id: participant.peer_id.clone(),
            },
        );
        Some(participant)
    }

    fn post_link_event(&self, peer_id: &str, event: LinkEvent) {
        if let Some(sink) = self.endpoints.get(peer_id) {
            sink.send(event);
        }
    }
}

/// Shared in-process transport. Clones share the same hub.
#[derive(Clone)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
    logger: Logger,
}

fn lock(state: &Mutex<HubState>) -> MutexGuard<'_, HubState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl LoopbackHub {
    pub fn new(logger: Logger) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            logger: logger.for_component("Loopback"),
        }
    }

    /// A signaling channel attached to this hub, one per session.
    pub fn signaling(&self) -> LoopbackSignaling {
        LoopbackSignaling::new(self.clone())
    }

    /// A peer link primitive attached to this hub, one per session.
    pub fn links(&self) -> LoopbackLinks {
        LoopbackLinks::new(self.clone())
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        lock(&self.state)
    }

    // ===== Test hooks =====

    /// Redelivers the current roster to every connected member of `room`.
    pub fn rebroadcast(&self, room: &str) {
        self.logger.debug(&format!("Rebroadcasting roster of '{}'", room));
        self.state().broadcast_roster(room);
    }

    /// Drops the signaling connection of `peer_id` without the relay noticing.
    ///
    /// The member stays listed for everyone else; it stops receiving
    /// broadcasts and is told its transport went down.
    pub fn drop_transport(&self, peer_id: &str) -> bool {
        let mut state = self.state();
        let Some(member) = state
            .members
            .values_mut()
            .find(|m| m.participant.as_ref().is_some_and(|p| p.peer_id == peer_id))
        else {
            return false;
        };
        member.connected = false;
        member
            .sink
            .send(SignalEvent::StatusChanged(TransportStatus::Disconnected));
        self.logger.info(&format!("Signaling transport of {} dropped", peer_id));
        true
    }

    /// Makes every new link to or from `peer_id` fail negotiation.
    pub fn set_unreachable(&self, peer_id: &str, unreachable: bool) {
        let mut state = self.state();
        if unreachable {
            state.unreachable.insert(peer_id.to_string());
        } else {
            state.unreachable.remove(peer_id);
        }
    }

    /// Announced members of `room`.
    pub fn room_members(&self, room: &str) -> Vec<Participant> {
        let mut members = self.state().roster(room);
        members.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        members
    }

    /// Links neither side has closed yet.
    pub fn open_link_count(&self) -> usize {
        self.state().links.len()
    }

    /// Open peer link endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.state().endpoints.len()
    }
}
