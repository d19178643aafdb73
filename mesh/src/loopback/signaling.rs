use super::{LoopbackHub, Member};
use crate::models::Participant;
use crate::signaling::{
    Announcement, SignalEvent, SignalEventSink, SignalingChannel, SignalingError, TransportStatus,
};

/// One session's connection to the loopback relay.
pub struct LoopbackSignaling {
    hub: LoopbackHub,
    member: Option<u64>,
}

impl LoopbackSignaling {
    pub(super) fn new(hub: LoopbackHub) -> Self {
        Self { hub, member: None }
    }
}

impl SignalingChannel for LoopbackSignaling {
    fn connect(&mut self, room: &str, events: SignalEventSink) -> Result<(), SignalingError> {
        self.disconnect();

        let mut state = self.hub.state();
        let id = state.next_member;
        state.next_member += 1;
        events.send(SignalEvent::StatusChanged(TransportStatus::Connected));
        state.members.insert(
            id,
            Member {
                room: room.to_string(),
                sink: events,
                participant: None,
                connected: true,
            },
        );
        self.member = Some(id);
        self.hub
            .logger
            .debug(&format!("Member {} connected to room '{}'", id, room));
        Ok(())
    }

    fn announce(&mut self, announcement: &Announcement) -> Result<(), SignalingError> {
        let id = self.member.ok_or(SignalingError::NotConnected)?;
        let mut state = self.hub.state();
        let member = state
            .members
            .get_mut(&id)
            .ok_or(SignalingError::NotConnected)?;
        if !member.connected {
            return Err(SignalingError::NotConnected);
        }
        if member.room != announcement.room {
            return Err(SignalingError::Rejected(format!(
                "announced room '{}' but connected to '{}'",
                announcement.room, member.room
            )));
        }

        member.participant = Some(Participant::new(
            announcement.peer_id.clone(),
            announcement.display_name.clone(),
        ));
        let room = member.room.clone();

        state.broadcast_roster(&room);
        state.broadcast(
            &room,
            Some(id),
            &SignalEvent::PeerJoined {
                display_name: announcement.display_name.clone(),
            },
        );
        self.hub.logger.info(&format!(
            "'{}' ({}) announced in '{}'",
            announcement.display_name, announcement.peer_id, room
        ));
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(id) = self.member.take() else {
            return;
        };
        if let Some(participant) = self.hub.state().depart(id) {
            self.hub.logger.info(&format!(
                "'{}' ({}) left",
                participant.display_name, participant.peer_id
            ));
        }
    }
}

impl Drop for LoopbackSignaling {
    fn drop(&mut self) {
        self.disconnect();
    }
}
