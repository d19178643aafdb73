//! Mesh Session Manager
//!
//! [`MeshSession`] owns one room membership: the roster snapshot, the link
//! table, the voice and shared-screen registries, speaking state and the room
//! event log. Collaborators never call into it directly; they post events into
//! its queue, and the session applies them one at a time when the owner calls
//! [`MeshSession::process_pending`] or hands the session to
//! [`spawn_session`].

mod events;
mod runner;
mod snapshot;

pub use events::SessionCommand;
pub(crate) use events::SessionEvent;
pub use runner::{SessionHandle, spawn_session};
pub use snapshot::{SessionSnapshot, SessionUpdate};

use crate::config::MeshConfig;
use crate::error::{Result, SessionError};
use crate::link::{Channel, Completion, LinkEvent, LinkEventSink, LinkId, LinkTable, PeerLink, PeerLinkFactory};
use crate::media::{MediaDevices, MediaOptions};
use crate::models::{MediaStream, Participant, PeerId, Roster, SpeakerKey, StreamKind, StreamTag};
use crate::notify::{EventLog, NotificationSink, RoomNotifier};
use crate::signaling::{Announcement, SignalEvent, SignalEventSink, SignalingChannel, TransportStatus};
use crate::vad::{DetectorHandle, VadSettings, spawn_detector};
use logging::Logger;
use snapshot::Observer;
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

struct RemoteVoice {
    link_id: LinkId,
    display_name: String,
    stream: MediaStream,
    _detector: DetectorHandle,
    detector_id: u64,
}

struct SharedScreen {
    stream: MediaStream,
    /// `None` for our own share.
    peer_id: Option<PeerId>,
    link_id: Option<LinkId>,
}

/// Starts detectors that report into the session queue.
struct DetectorSpawner {
    tx: Sender<SessionEvent>,
    settings: VadSettings,
    logger: Logger,
}

impl DetectorSpawner {
    fn spawn(&self, key: SpeakerKey, stream: MediaStream) -> DetectorHandle {
        let tx = self.tx.clone();
        let reported = key.clone();
        spawn_detector(key, stream, self.settings, &self.logger, move |detector_id, speaking| {
            tx.send(SessionEvent::Speaking {
                key: reported.clone(),
                detector_id,
                speaking,
            })
            .is_ok()
        })
    }
}

/// State that exists only while in a room.
struct Membership {
    display_name: String,
    room: String,
    local_peer: PeerId,
    local_voice: MediaStream,
    local_detector: DetectorHandle,
    screen: Option<MediaStream>,
    roster: Roster,
    roster_frozen: bool,
    links: LinkTable,
    voices: HashMap<PeerId, RemoteVoice>,
    screens: BTreeMap<String, SharedScreen>,
    speaking: BTreeMap<SpeakerKey, bool>,
}

impl Membership {
    fn is_muted(&self) -> bool {
        self.local_voice.audio_tracks().all(|t| !t.is_enabled())
    }

    fn remove_voice(&mut self, peer_id: &str, observer: &Observer) {
        if self.voices.remove(peer_id).is_some() {
            observer.emit(SessionUpdate::VoiceRemoved {
                peer_id: peer_id.to_string(),
            });
        }
        self.speaking.remove(&SpeakerKey::Remote(peer_id.to_string()));
    }

    fn remove_screens<F>(&mut self, observer: &Observer, matches: F)
    where
        F: Fn(&str, &SharedScreen) -> bool,
    {
        let doomed: Vec<String> = self
            .screens
            .iter()
            .filter(|(name, screen)| matches(name.as_str(), screen))
            .map(|(name, _)| name.clone())
            .collect();
        for source_name in doomed {
            self.screens.remove(&source_name);
            observer.emit(SessionUpdate::ScreenRemoved { source_name });
        }
    }

    /// Drops every trace of a peer: links, voice, speaking flag, screens.
    ///
    /// Screens are matched by owner only; display names are not unique.
    fn purge_peer(&mut self, peer_id: &str, observer: &Observer) {
        self.links.close_peer(peer_id);
        self.remove_voice(peer_id, observer);
        self.remove_screens(observer, |_, screen| {
            screen.peer_id.as_deref() == Some(peer_id)
        });
    }

    /// Removes the media that travelled over a link that is gone.
    fn drop_link_media(&mut self, peer_id: &str, channel: Channel, link_id: &str, observer: &Observer) {
        match channel {
            Channel::Voice => {
                if self.voices.get(peer_id).is_some_and(|v| v.link_id == link_id) {
                    self.remove_voice(peer_id, observer);
                }
            }
            Channel::ScreenIn => {
                self.remove_screens(observer, |_, screen| {
                    screen.link_id.as_deref() == Some(link_id)
                });
            }
            Channel::ScreenOut => {}
        }
    }

    fn participants(&self) -> Vec<Participant> {
        self.roster.sorted()
    }
}

/// One participant's view of a full-mesh room.
pub struct MeshSession {
    config: MeshConfig,
    logger: Logger,
    media: Box<dyn MediaDevices>,
    links: Box<dyn PeerLinkFactory>,
    signaling: Box<dyn SignalingChannel>,
    notifier: RoomNotifier,
    detectors: DetectorSpawner,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    observer: Observer,
    event_log: EventLog,
    transport: TransportStatus,
    joined: Option<Membership>,
}

impl MeshSession {
    pub fn new(
        config: MeshConfig,
        logger: Logger,
        media: Box<dyn MediaDevices>,
        links: Box<dyn PeerLinkFactory>,
        signaling: Box<dyn SignalingChannel>,
        notifications: Box<dyn NotificationSink>,
    ) -> Self {
        let logger = logger.for_component("Mesh");
        let (events_tx, events_rx) = mpsc::channel();
        let detectors = DetectorSpawner {
            tx: events_tx.clone(),
            settings: config.vad,
            logger: logger.clone(),
        };
        let notifier = RoomNotifier::new(notifications, &logger);

        Self {
            config,
            logger,
            media,
            links,
            signaling,
            notifier,
            detectors,
            events_tx,
            events_rx,
            observer: Observer::default(),
            event_log: EventLog::new(),
            transport: TransportStatus::Disconnected,
            joined: None,
        }
    }

    /// Returns a channel receiving every subsequent [`SessionUpdate`].
    /// Replaces any previous subscriber.
    pub fn subscribe(&mut self) -> Receiver<SessionUpdate> {
        let (tx, rx) = mpsc::channel();
        self.observer.set(tx);
        rx
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // User operations
    // ---------------------------------------------------------------------

    /// Joins `room` as `display_name` and returns the local peer id.
    ///
    /// Captures the microphone, starts local voice detection, opens the peer
    /// link endpoint, connects signaling and announces. A failure at any step
    /// releases what the earlier steps acquired.
    pub fn join(&mut self, display_name: &str, room: &str, options: MediaOptions) -> Result<PeerId> {
        if self.joined.is_some() {
            return Err(SessionError::AlreadyJoined);
        }
        let display_name = display_name.trim();
        let room = room.trim();
        if display_name.is_empty() {
            return Err(SessionError::InvalidInput("display name is empty".to_string()));
        }
        if room.is_empty() {
            return Err(SessionError::InvalidInput("room is empty".to_string()));
        }

        self.logger.info(&format!(
            "Joining room '{}' as '{}' (quality {}, {} Hz)",
            room,
            display_name,
            options.audio_quality,
            options.audio_quality.sample_rate()
        ));

        let local_voice = match self.media.capture_microphone(&options) {
            Ok(stream) => stream,
            Err(e) => {
                self.logger.error(&format!("Microphone unavailable: {}", e));
                return Err(e.into());
            }
        };
        let local_detector = self.detectors.spawn(SpeakerKey::Local, local_voice.clone());

        let local_peer = match self.links.open(LinkEventSink::new(self.events_tx.clone())) {
            Ok(peer_id) => peer_id,
            Err(e) => {
                self.logger.error(&format!("Could not open peer endpoint: {}", e));
                local_voice.stop();
                return Err(e.into());
            }
        };

        let signal_sink = SignalEventSink::new(self.events_tx.clone());
        if let Err(e) = self.signaling.connect(room, signal_sink) {
            self.logger.error(&format!("Signaling connect failed: {}", e));
            self.links.shutdown();
            local_voice.stop();
            return Err(e.into());
        }

        let announcement = Announcement {
            display_name: display_name.to_string(),
            room: room.to_string(),
            peer_id: local_peer.clone(),
        };
        if let Err(e) = self.signaling.announce(&announcement) {
            self.logger.error(&format!("Announce failed: {}", e));
            self.signaling.disconnect();
            self.links.shutdown();
            local_voice.stop();
            return Err(e.into());
        }

        self.notifier.request_permission();

        let mut speaking = BTreeMap::new();
        speaking.insert(SpeakerKey::Local, false);
        self.joined = Some(Membership {
            display_name: display_name.to_string(),
            room: room.to_string(),
            local_peer: local_peer.clone(),
            local_voice,
            local_detector,
            screen: None,
            roster: Roster::new(),
            roster_frozen: false,
            links: LinkTable::new(local_peer.clone()),
            voices: HashMap::new(),
            screens: BTreeMap::new(),
            speaking,
        });

        self.logger.info(&format!("Joined room '{}' as peer {}", room, local_peer));
        self.observer.emit(SessionUpdate::Joined {
            room: room.to_string(),
            peer_id: local_peer.clone(),
        });
        Ok(local_peer)
    }

    /// Flips the local audio tracks and returns the new muted state.
    ///
    /// No link is touched: a muted track carries silence.
    pub fn toggle_mute(&mut self) -> Result<bool> {
        let state = self.joined.as_mut().ok_or(SessionError::NotJoined)?;
        let muted = !state.is_muted();
        for track in state.local_voice.audio_tracks() {
            track.set_enabled(!muted);
        }
        self.logger.info(if muted { "Microphone muted" } else { "Microphone unmuted" });
        self.observer.emit(SessionUpdate::MuteChanged(muted));
        Ok(muted)
    }

    /// Captures the screen and sends it to every other roster member.
    pub fn start_screen_share(&mut self) -> Result<()> {
        let state = self.joined.as_mut().ok_or(SessionError::NotJoined)?;
        if state.screen.is_some() {
            return Err(SessionError::AlreadySharing);
        }

        let stream = match self.media.capture_screen() {
            Ok(stream) => stream,
            Err(e) => {
                self.logger.warn(&format!("Screen capture refused: {}", e));
                return Err(e.into());
            }
        };

        for track in stream.video_tracks() {
            let tx = self.events_tx.clone();
            let stream_id = stream.id().to_string();
            track.on_ended(move || {
                let _ = tx.send(SessionEvent::ScreenCaptureEnded { stream_id });
            });
        }

        state.screen = Some(stream.clone());
        if let Some(owner) = state
            .screens
            .get(&state.display_name)
            .and_then(|s| s.peer_id.as_ref())
        {
            self.logger.warn(&format!(
                "Local share hides the screen of '{}' from {}",
                state.display_name, owner
            ));
        }
        state.screens.insert(
            state.display_name.clone(),
            SharedScreen {
                stream,
                peer_id: None,
                link_id: None,
            },
        );

        let targets: Vec<PeerId> = state
            .participants()
            .into_iter()
            .map(|p| p.peer_id)
            .filter(|id| *id != state.local_peer)
            .collect();
        for peer_id in &targets {
            originate(self.links.as_mut(), state, &self.logger, peer_id, StreamKind::Screen);
        }

        self.logger.info(&format!("Screen share started to {} peer(s)", targets.len()));
        self.observer.emit(SessionUpdate::SharingChanged(true));
        self.observer.emit(SessionUpdate::ScreenAdded {
            source_name: state.display_name.clone(),
        });
        Ok(())
    }

    /// Ends the local screen share. Does nothing when not sharing.
    pub fn stop_screen_share(&mut self) -> Result<()> {
        let Some(state) = self.joined.as_mut() else {
            return Ok(());
        };
        let Some(stream) = state.screen.take() else {
            return Ok(());
        };

        stream.stop();
        let peers = state.links.close_channel(Channel::ScreenOut);
        state.remove_screens(&self.observer, |_, screen| screen.peer_id.is_none());

        self.logger.info(&format!(
            "Screen share stopped, closed {} screen link(s)",
            peers.len()
        ));
        self.observer.emit(SessionUpdate::SharingChanged(false));
        Ok(())
    }

    /// Leaves the room.
    ///
    /// Releases captures first, then every link and the local endpoint, then
    /// the signaling channel. Detectors are stopped and queued events dropped
    /// afterwards so nothing reaches the torn-down membership.
    pub fn leave(&mut self) -> Result<()> {
        let Some(mut state) = self.joined.take() else {
            return Err(SessionError::NotJoined);
        };

        state.local_voice.stop();
        if let Some(screen) = state.screen.take() {
            screen.stop();
        }

        let open_links = state.links.len();
        state.links.close_all();
        self.links.shutdown();

        self.signaling.disconnect();
        self.transport = TransportStatus::Disconnected;

        state.local_detector.stop();
        state.voices.clear();
        state.screens.clear();
        state.speaking.clear();
        let room = state.room.clone();

        let discarded = self.discard_pending();
        self.logger.info(&format!(
            "Left room '{}' ({} link(s) closed, {} queued event(s) discarded)",
            room, open_links, discarded
        ));
        self.observer.emit(SessionUpdate::TransportChanged(TransportStatus::Disconnected));
        self.observer.emit(SessionUpdate::Left);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Event loop
    // ---------------------------------------------------------------------

    /// Applies every queued event without blocking. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            if !self.handle_event(event) {
                break;
            }
        }
        handled
    }

    /// Blocks on the queue until a shutdown request, then leaves the room.
    pub(crate) fn run(mut self) {
        while let Ok(event) = self.events_rx.recv() {
            if !self.handle_event(event) {
                break;
            }
        }
        if self.joined.is_some() {
            let _ = self.leave();
        }
    }

    pub(crate) fn event_sender(&self) -> Sender<SessionEvent> {
        self.events_tx.clone()
    }

    fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        loop {
            match self.events_rx.try_recv() {
                Ok(SessionEvent::Link(LinkEvent::Incoming(mut link))) => {
                    link.close();
                    discarded += 1;
                }
                Ok(_) => discarded += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        discarded
    }

    /// Returns `false` on shutdown.
    fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Link(event) => self.on_link_event(event),
            SessionEvent::Signal(event) => self.on_signal_event(event),
            SessionEvent::Speaking {
                key,
                detector_id,
                speaking,
            } => self.on_speaking(key, detector_id, speaking),
            SessionEvent::ScreenCaptureEnded { stream_id } => self.on_screen_capture_ended(&stream_id),
            SessionEvent::Command(command) => self.on_command(command),
            SessionEvent::Shutdown => return false,
        }
        true
    }

    fn on_command(&mut self, command: SessionCommand) {
        let name = command.name();
        let result = match command {
            SessionCommand::Join {
                display_name,
                room,
                options,
            } => {
                let options = options.unwrap_or_else(|| self.config.media_options());
                self.join(&display_name, &room, options).map(|_| ())
            }
            SessionCommand::ToggleMute => self.toggle_mute().map(|_| ()),
            SessionCommand::StartScreenShare => self.start_screen_share(),
            SessionCommand::StopScreenShare => self.stop_screen_share(),
            SessionCommand::Leave => self.leave(),
        };
        if let Err(error) = result {
            self.logger.warn(&format!("Command {} failed: {}", name, error));
            self.observer.emit(SessionUpdate::CommandFailed { command: name, error });
        }
    }

    fn on_signal_event(&mut self, event: SignalEvent) {
        match event {
            SignalEvent::StatusChanged(status) => self.on_transport_status(status),
            SignalEvent::RosterUpdated(members) => self.on_roster_update(members),
            SignalEvent::PeerJoined { display_name } => self.on_peer_joined(&display_name),
            SignalEvent::PeerLeft {
                display_name,
                peer_id,
            } => self.on_peer_left(&display_name, &peer_id),
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Incoming(link) => self.on_incoming_link(link),
            LinkEvent::RemoteStream { link_id, stream } => self.on_remote_stream(&link_id, stream),
            LinkEvent::Failed { link_id, reason } => self.on_link_failed(&link_id, &reason),
            LinkEvent::Closed { link_id } => self.on_link_closed(&link_id),
        }
    }

    // ---------------------------------------------------------------------
    // Signaling
    // ---------------------------------------------------------------------

    fn on_transport_status(&mut self, status: TransportStatus) {
        if status == self.transport {
            return;
        }
        self.transport = status;
        self.observer.emit(SessionUpdate::TransportChanged(status));

        let Some(state) = self.joined.as_mut() else {
            return;
        };
        match status {
            TransportStatus::Connected => {
                state.roster_frozen = false;
                self.logger.info("Signaling connected");
            }
            TransportStatus::Disconnected | TransportStatus::Error => {
                state.roster_frozen = true;
                let error = SessionError::TransportDisconnected(format!("status {}", status));
                self.logger.error(&format!("{}; roster frozen, links kept", error));
            }
        }
    }

    /// Applies a full roster snapshot.
    ///
    /// Peers that disappeared lose all their links and media. Every listed
    /// peer without a voice link gets one; while sharing, every listed peer
    /// without a screen link gets one too. Reapplying the same snapshot
    /// changes nothing.
    fn on_roster_update(&mut self, members: Vec<Participant>) {
        let Some(state) = self.joined.as_mut() else {
            return;
        };
        if state.roster_frozen {
            self.logger.debug("Roster update ignored while transport is down");
            return;
        }

        let next = Roster::from_members(members);
        let departed: Vec<PeerId> = state.roster.departed_in(&next).cloned().collect();
        state.roster = next;

        for peer_id in &departed {
            self.logger.info(&format!("Peer {} no longer in roster", peer_id));
            state.purge_peer(peer_id, &self.observer);
        }

        let others: Vec<PeerId> = state
            .participants()
            .into_iter()
            .map(|p| p.peer_id)
            .filter(|id| *id != state.local_peer)
            .collect();
        for peer_id in &others {
            if !state.links.has_slot(peer_id, Channel::Voice) {
                originate(self.links.as_mut(), state, &self.logger, peer_id, StreamKind::Voice);
            }
            if state.screen.is_some() && !state.links.has_slot(peer_id, Channel::ScreenOut) {
                originate(self.links.as_mut(), state, &self.logger, peer_id, StreamKind::Screen);
            }
        }

        self.logger.debug(&format!(
            "Roster applied: {} member(s), {} link(s) held",
            state.roster.len(),
            state.links.len()
        ));
        self.observer.emit(SessionUpdate::RosterChanged(state.participants()));
    }

    fn on_peer_joined(&mut self, display_name: &str) {
        self.narrate(format!("{} joined the room", display_name));
    }

    fn on_peer_left(&mut self, display_name: &str, peer_id: &str) {
        self.narrate(format!("{} left the room", display_name));

        let Some(state) = self.joined.as_mut() else {
            return;
        };
        if peer_id == state.local_peer {
            return;
        }
        state.purge_peer(peer_id, &self.observer);
        if state.roster.remove(peer_id).is_some() {
            self.observer.emit(SessionUpdate::RosterChanged(state.participants()));
        }
    }

    fn narrate(&mut self, message: String) {
        self.logger.info(&message);
        self.notifier.notify(message.clone());
        let entry = self.event_log.append(message).clone();
        self.observer.emit(SessionUpdate::LogAppended(entry));
    }

    // ---------------------------------------------------------------------
    // Peer links
    // ---------------------------------------------------------------------

    fn on_incoming_link(&mut self, mut link: Box<dyn PeerLink>) {
        let Some(state) = self.joined.as_mut() else {
            link.close();
            return;
        };
        let peer_id = link.remote_peer().clone();
        if peer_id == state.local_peer {
            self.logger.warn("Refusing link from own peer id");
            link.close();
            return;
        }

        let tag = link.tag().clone();
        match tag.kind {
            StreamKind::Screen => {
                // A new share from the same peer replaces the old one
                if state.links.close_slot(&peer_id, Channel::ScreenIn) {
                    state.remove_screens(&self.observer, |_, screen| {
                        screen.peer_id.as_deref() == Some(peer_id.as_str())
                    });
                }
                if let Err(e) = link.accept(None) {
                    self.logger.warn(&format!("Could not accept screen from {}: {}", peer_id, e));
                    link.close();
                    return;
                }
                self.logger.info(&format!("Receiving screen of '{}' from {}", tag.source_name, peer_id));
                state.links.insert_negotiating(Channel::ScreenIn, link);
            }
            StreamKind::Voice => {
                if !state.links.would_prefer(Channel::Voice, link.as_ref()) {
                    self.logger.debug(&format!(
                        "Dropping redundant voice link {} from {}",
                        link.id(),
                        peer_id
                    ));
                    link.close();
                    return;
                }
                if let Err(e) = link.accept(Some(state.local_voice.clone())) {
                    self.logger.warn(&format!("Could not accept voice from {}: {}", peer_id, e));
                    link.close();
                    return;
                }
                self.logger.debug(&format!("Accepted voice link {} from {}", link.id(), peer_id));
                state.links.insert_negotiating(Channel::Voice, link);
            }
        }
    }

    fn on_remote_stream(&mut self, link_id: &str, stream: MediaStream) {
        let Some(state) = self.joined.as_mut() else {
            return;
        };
        let tag = state.links.link_tag(link_id).cloned();

        let (peer_id, channel) = match state.links.complete(link_id) {
            Completion::Established { peer_id, channel } => (peer_id, channel),
            Completion::Replaced {
                peer_id,
                channel,
                previous,
            } => {
                self.logger.debug(&format!(
                    "Link {} to {} replaces {}",
                    link_id, peer_id, previous
                ));
                (peer_id, channel)
            }
            Completion::Redundant { peer_id, .. } => {
                self.logger.debug(&format!("Closed duplicate link {} to {}", link_id, peer_id));
                return;
            }
            Completion::AlreadyEstablished | Completion::Unknown => return,
        };
        let Some(tag) = tag else {
            return;
        };

        match channel {
            Channel::Voice => {
                let display_name = state
                    .roster
                    .display_name(&peer_id)
                    .unwrap_or(tag.source_name.as_str())
                    .to_string();
                let detector = self
                    .detectors
                    .spawn(SpeakerKey::Remote(peer_id.clone()), stream.clone());
                let voice = RemoteVoice {
                    link_id: link_id.to_string(),
                    display_name: display_name.clone(),
                    stream,
                    detector_id: detector.id(),
                    _detector: detector,
                };
                // Replacing drops the old detector
                state.voices.insert(peer_id.clone(), voice);
                state.speaking.insert(SpeakerKey::Remote(peer_id.clone()), false);

                self.logger.info(&format!("Voice of '{}' ({}) connected", display_name, peer_id));
                self.observer.emit(SessionUpdate::VoiceAdded {
                    peer_id,
                    display_name,
                });
            }
            Channel::ScreenIn => {
                let source_name = tag.source_name;
                match state.screens.get(&source_name).map(|s| s.peer_id.clone()) {
                    Some(None) => {
                        // Our own share keeps its entry; the link stays up so
                        // it can be torn down normally
                        self.logger.warn(&format!(
                            "Screen of '{}' from {} hidden by the local share of the same name",
                            source_name, peer_id
                        ));
                        return;
                    }
                    Some(Some(owner)) if owner != peer_id => {
                        self.logger.warn(&format!(
                            "Screen of '{}' from {} replaces the one from {}",
                            source_name, peer_id, owner
                        ));
                    }
                    _ => {}
                }
                state.screens.insert(
                    source_name.clone(),
                    SharedScreen {
                        stream,
                        peer_id: Some(peer_id),
                        link_id: Some(link_id.to_string()),
                    },
                );
                self.logger.info(&format!("Screen of '{}' available", source_name));
                self.observer.emit(SessionUpdate::ScreenAdded { source_name });
            }
            Channel::ScreenOut => {}
        }
    }

    fn on_link_failed(&mut self, link_id: &str, reason: &str) {
        let Some(state) = self.joined.as_mut() else {
            return;
        };
        let Some(removed) = state.links.remove(link_id) else {
            return;
        };
        let error = SessionError::LinkNegotiationFailed {
            peer_id: removed.peer_id.clone(),
            reason: reason.to_string(),
        };
        self.logger.warn(&format!("{} (retry on next roster)", error));
        if removed.was_established {
            state.drop_link_media(&removed.peer_id, removed.channel, link_id, &self.observer);
        }
    }

    fn on_link_closed(&mut self, link_id: &str) {
        let Some(state) = self.joined.as_mut() else {
            return;
        };
        let Some(removed) = state.links.remove(link_id) else {
            return;
        };
        self.logger.debug(&format!(
            "Link {} ({:?}) to {} closed by remote",
            link_id, removed.channel, removed.peer_id
        ));
        if removed.was_established {
            state.drop_link_media(&removed.peer_id, removed.channel, link_id, &self.observer);
        }
    }

    // ---------------------------------------------------------------------
    // Local media
    // ---------------------------------------------------------------------

    fn on_speaking(&mut self, key: SpeakerKey, detector_id: u64, speaking: bool) {
        let Some(state) = self.joined.as_mut() else {
            return;
        };
        let current = match &key {
            SpeakerKey::Local => state.local_detector.id() == detector_id,
            SpeakerKey::Remote(peer_id) => state
                .voices
                .get(peer_id)
                .is_some_and(|v| v.detector_id == detector_id),
        };
        if !current {
            return;
        }
        if state.speaking.insert(key.clone(), speaking) != Some(speaking) {
            self.observer.emit(SessionUpdate::SpeakingChanged { key, speaking });
        }
    }

    fn on_screen_capture_ended(&mut self, stream_id: &str) {
        let sharing_this = self
            .joined
            .as_ref()
            .and_then(|state| state.screen.as_ref())
            .is_some_and(|screen| screen.id() == stream_id);
        if sharing_this {
            self.logger.info("Screen capture ended by the platform");
            let _ = self.stop_screen_share();
        }
    }

    // ---------------------------------------------------------------------
    // Read accessors
    // ---------------------------------------------------------------------

    pub fn is_joined(&self) -> bool {
        self.joined.is_some()
    }

    pub fn room(&self) -> Option<&str> {
        self.joined.as_ref().map(|s| s.room.as_str())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.joined.as_ref().map(|s| s.display_name.as_str())
    }

    pub fn local_peer_id(&self) -> Option<&str> {
        self.joined.as_ref().map(|s| s.local_peer.as_str())
    }

    /// Roster sorted by display name; empty outside a room.
    pub fn roster(&self) -> Vec<Participant> {
        self.joined
            .as_ref()
            .map(Membership::participants)
            .unwrap_or_default()
    }

    pub fn speaking(&self) -> BTreeMap<SpeakerKey, bool> {
        self.joined
            .as_ref()
            .map(|s| s.speaking.clone())
            .unwrap_or_default()
    }

    pub fn is_speaking(&self, key: &SpeakerKey) -> bool {
        self.joined
            .as_ref()
            .and_then(|s| s.speaking.get(key).copied())
            .unwrap_or(false)
    }

    /// Source names of every registered screen, own share included.
    pub fn shared_screens(&self) -> Vec<String> {
        self.joined
            .as_ref()
            .map(|s| s.screens.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn shared_screen(&self, source_name: &str) -> Option<MediaStream> {
        self.joined
            .as_ref()
            .and_then(|s| s.screens.get(source_name))
            .map(|screen| screen.stream.clone())
    }

    /// `(peer id, announced name)` of every playing remote voice, by peer id.
    pub fn remote_voices(&self) -> Vec<(PeerId, String)> {
        let mut voices: Vec<(PeerId, String)> = self
            .joined
            .as_ref()
            .map(|s| {
                s.voices
                    .iter()
                    .map(|(id, v)| (id.clone(), v.display_name.clone()))
                    .collect()
            })
            .unwrap_or_default();
        voices.sort();
        voices
    }

    pub fn remote_voice(&self, peer_id: &str) -> Option<MediaStream> {
        self.joined
            .as_ref()
            .and_then(|s| s.voices.get(peer_id))
            .map(|v| v.stream.clone())
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn is_muted(&self) -> bool {
        self.joined.as_ref().is_some_and(Membership::is_muted)
    }

    pub fn is_sharing(&self) -> bool {
        self.joined.as_ref().is_some_and(|s| s.screen.is_some())
    }

    pub fn transport_status(&self) -> TransportStatus {
        self.transport
    }

    /// Established voice links.
    pub fn voice_link_count(&self) -> usize {
        self.joined
            .as_ref()
            .map(|s| s.links.established_count(Channel::Voice))
            .unwrap_or(0)
    }

    /// Established screen links, outgoing and incoming.
    pub fn screen_link_count(&self) -> usize {
        self.joined
            .as_ref()
            .map(|s| {
                s.links.established_count(Channel::ScreenOut)
                    + s.links.established_count(Channel::ScreenIn)
            })
            .unwrap_or(0)
    }

    /// Outgoing screen links only.
    pub fn outgoing_screen_link_count(&self) -> usize {
        self.joined
            .as_ref()
            .map(|s| s.links.established_count(Channel::ScreenOut))
            .unwrap_or(0)
    }

    /// Every link held, established or negotiating.
    pub fn active_link_count(&self) -> usize {
        self.joined.as_ref().map(|s| s.links.len()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let Some(state) = self.joined.as_ref() else {
            return SessionSnapshot {
                transport: self.transport,
                event_log: self.event_log.entries().to_vec(),
                ..SessionSnapshot::default()
            };
        };
        SessionSnapshot {
            room: Some(state.room.clone()),
            display_name: Some(state.display_name.clone()),
            local_peer_id: Some(state.local_peer.clone()),
            participants: state.participants(),
            speaking: state.speaking.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            shared_screens: state.screens.keys().cloned().collect(),
            remote_voices: self.remote_voices(),
            muted: state.is_muted(),
            sharing: state.screen.is_some(),
            transport: self.transport,
            voice_links: self.voice_link_count(),
            screen_links: self.screen_link_count(),
            event_log: self.event_log.entries().to_vec(),
        }
    }
}

impl Drop for MeshSession {
    fn drop(&mut self) {
        if self.joined.is_some() {
            let _ = self.leave();
        }
    }
}

/// Originates one link to `peer_id`. A failure is logged; the next roster
/// broadcast retries it.
fn originate(
    factory: &mut dyn PeerLinkFactory,
    state: &mut Membership,
    logger: &Logger,
    peer_id: &PeerId,
    kind: StreamKind,
) {
    let (local, channel) = match kind {
        StreamKind::Voice => (state.local_voice.clone(), Channel::Voice),
        StreamKind::Screen => match &state.screen {
            Some(screen) => (screen.clone(), Channel::ScreenOut),
            None => return,
        },
    };
    let tag = StreamTag {
        source_name: state.display_name.clone(),
        kind,
    };

    match factory.originate(peer_id, Some(local), tag) {
        Ok(link) => {
            logger.debug(&format!("Originated {} link {} to {}", kind, link.id(), peer_id));
            // Outgoing screens need no answer media to count as up
            if channel == Channel::ScreenOut {
                state.links.insert_established(channel, link);
            } else {
                state.links.insert_negotiating(channel, link);
            }
        }
        Err(e) => {
            let error = SessionError::LinkNegotiationFailed {
                peer_id: peer_id.clone(),
                reason: e.to_string(),
            };
            logger.warn(&format!("{} (retry on next roster)", error));
        }
    }
}
