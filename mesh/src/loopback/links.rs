use super::{LinkRecord, LoopbackHub};
use crate::link::{LinkDirection, LinkError, LinkEvent, LinkEventSink, LinkId, PeerLink, PeerLinkFactory};
use crate::models::{MediaStream, PeerId, StreamTag, generate_id};

/// One session's endpoint on the loopback hub.
pub struct LoopbackLinks {
    hub: LoopbackHub,
    peer: Option<PeerId>,
}

impl LoopbackLinks {
    pub(super) fn new(hub: LoopbackHub) -> Self {
        Self { hub, peer: None }
    }

    pub fn peer_id(&self) -> Option<&str> {
        self.peer.as_deref()
    }
}

impl PeerLinkFactory for LoopbackLinks {
    fn open(&mut self, events: LinkEventSink) -> Result<PeerId, LinkError> {
        self.shutdown();
        let peer_id = generate_id("peer");
        self.hub.state().endpoints.insert(peer_id.clone(), events);
        self.hub.logger.debug(&format!("Endpoint {} open", peer_id));
        self.peer = Some(peer_id.clone());
        Ok(peer_id)
    }

    fn originate(
        &mut self,
        remote: &PeerId,
        local: Option<MediaStream>,
        tag: StreamTag,
    ) -> Result<Box<dyn PeerLink>, LinkError> {
        let caller = self.peer.clone().ok_or(LinkError::NotOpen)?;
        let mut state = self.hub.state();
        if !state.endpoints.contains_key(remote) {
            return Err(LinkError::UnknownPeer(remote.clone()));
        }

        let link_id = generate_id("link");
        let outbound = LoopbackLink {
            hub: self.hub.clone(),
            id: link_id.clone(),
            remote: remote.clone(),
            direction: LinkDirection::Outbound,
            tag: tag.clone(),
            closed: false,
        };

        if state.unreachable.contains(&caller) || state.unreachable.contains(remote) {
            self.hub
                .logger
                .debug(&format!("Link {} to {} unreachable", link_id, remote));
            state.post_link_event(
                &caller,
                LinkEvent::Failed {
                    link_id,
                    reason: "ICE connectivity checks failed".to_string(),
                },
            );
            return Ok(Box::new(outbound));
        }

        state.links.insert(
            link_id.clone(),
            LinkRecord {
                caller: caller.clone(),
                callee: remote.clone(),
                caller_stream: local,
            },
        );
        let inbound = LoopbackLink {
            hub: self.hub.clone(),
            id: link_id.clone(),
            remote: caller.clone(),
            direction: LinkDirection::Inbound,
            tag: tag.clone(),
            closed: false,
        };
        state.post_link_event(remote, LinkEvent::Incoming(Box::new(inbound)));
        self.hub.logger.debug(&format!(
            "Link {} ({}) {} -> {}",
            link_id, tag.kind, caller, remote
        ));
        Ok(Box::new(outbound))
    }

    fn shutdown(&mut self) {
        let Some(peer_id) = self.peer.take() else {
            return;
        };
        let mut state = self.hub.state();
        state.endpoints.remove(&peer_id);

        let orphaned: Vec<(LinkId, PeerId)> = state
            .links
            .iter()
            .filter_map(|(id, record)| {
                if record.caller == peer_id {
                    Some((id.clone(), record.callee.clone()))
                } else if record.callee == peer_id {
                    Some((id.clone(), record.caller.clone()))
                } else {
                    None
                }
            })
            .collect();
        for (link_id, other) in orphaned {
            state.links.remove(&link_id);
            state.post_link_event(&other, LinkEvent::Closed { link_id });
        }
        self.hub.logger.debug(&format!("Endpoint {} closed", peer_id));
    }
}

impl Drop for LoopbackLinks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One end of a loopback link.
///
/// Dropping a link does not close it; the hub lock may be held when an
/// undeliverable `Incoming` event is discarded.
pub struct LoopbackLink {
    hub: LoopbackHub,
    id: LinkId,
    remote: PeerId,
    direction: LinkDirection,
    tag: StreamTag,
    closed: bool,
}

impl PeerLink for LoopbackLink {
    fn id(&self) -> &LinkId {
        &self.id
    }

    fn remote_peer(&self) -> &PeerId {
        &self.remote
    }

    fn direction(&self) -> LinkDirection {
        self.direction
    }

    fn tag(&self) -> &StreamTag {
        &self.tag
    }

    fn accept(&mut self, local: Option<MediaStream>) -> Result<(), LinkError> {
        if self.closed || self.direction != LinkDirection::Inbound {
            return Err(LinkError::Closed);
        }
        let state = self.hub.state();
        let record = state.links.get(&self.id).ok_or(LinkError::Closed)?;

        if let Some(stream) = &record.caller_stream {
            state.post_link_event(
                &record.callee,
                LinkEvent::RemoteStream {
                    link_id: self.id.clone(),
                    stream: stream.clone(),
                },
            );
        }
        if let Some(stream) = local {
            state.post_link_event(
                &record.caller,
                LinkEvent::RemoteStream {
                    link_id: self.id.clone(),
                    stream,
                },
            );
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = self.hub.state();
        if state.links.remove(&self.id).is_some() {
            state.post_link_event(
                &self.remote,
                LinkEvent::Closed {
                    link_id: self.id.clone(),
                },
            );
        }
    }
}
