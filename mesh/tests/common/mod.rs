//! Shared fixtures: a loopback hub, sessions with fast voice detection, and
//! helpers to pump session queues until the mesh settles.

#![allow(dead_code)]

use logging::{LogCapture, LogLevel, Logger};
use roommesh::{
    LoopbackHub, MeshConfig, MeshSession, NotificationPermission, NotificationSink, PeerId,
    SilentNotifications, SyntheticMedia, VadSettings,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const ROOM: &str = "standup";

pub struct Fixture {
    pub hub: LoopbackHub,
    pub logger: Logger,
    pub capture: LogCapture,
}

impl Fixture {
    pub fn new() -> Self {
        let (logger, capture) = Logger::in_memory(LogLevel::Debug);
        let hub = LoopbackHub::new(logger.clone());
        Self {
            hub,
            logger,
            capture,
        }
    }

    pub fn peer(&self) -> Peer {
        self.peer_with(Box::new(SilentNotifications))
    }

    pub fn peer_with(&self, notifications: Box<dyn NotificationSink>) -> Peer {
        let media = SyntheticMedia::new();
        let session = MeshSession::new(
            fast_config(),
            self.logger.clone(),
            Box::new(media.clone()),
            Box::new(self.hub.links()),
            Box::new(self.hub.signaling()),
            notifications,
        );
        Peer { session, media }
    }
}

pub struct Peer {
    pub session: MeshSession,
    /// Shares state with the session's capture device.
    pub media: SyntheticMedia,
}

impl Peer {
    pub fn join(&mut self, name: &str) -> PeerId {
        let options = self.session.config().media_options();
        self.session.join(name, ROOM, options).unwrap()
    }

    /// Feeds white noise into the captured microphone.
    pub fn talk(&self) {
        let mic = self.media.microphone().unwrap();
        mic.tracks()[0].push_samples(&noise(1024));
    }
}

pub fn fast_config() -> MeshConfig {
    MeshConfig {
        vad: VadSettings {
            threshold: 20.0,
            interval: Duration::from_millis(10),
            fft_size: 512,
        },
        ..MeshConfig::default()
    }
}

pub fn noise(n: usize) -> Vec<f32> {
    (0..n).map(|_| rand::random::<f32>() - 0.5).collect()
}

/// Pumps every session until a full round handles nothing.
pub fn settle(peers: &mut [&mut Peer]) {
    for _ in 0..200 {
        let handled: usize = peers
            .iter_mut()
            .map(|p| p.session.process_pending())
            .sum();
        if handled == 0 {
            return;
        }
    }
    panic!("mesh did not settle");
}

/// Pumps sessions until `done` holds, for state fed by background threads.
pub fn wait_until<F>(peers: &mut [&mut Peer], timeout: Duration, done: F) -> bool
where
    F: Fn(&[&mut Peer]) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        for peer in peers.iter_mut() {
            peer.session.process_pending();
        }
        if done(peers) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Notification sink that records prompts and what it shows.
#[derive(Clone, Default)]
pub struct RecordingNotifications {
    refuse: bool,
    answer: Arc<Mutex<Option<NotificationPermission>>>,
    prompts: Arc<Mutex<usize>>,
    shown: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifications {
    /// A user who says no when asked.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> usize {
        *self.prompts.lock().unwrap()
    }
}

impl NotificationSink for RecordingNotifications {
    fn permission(&self) -> NotificationPermission {
        self.answer
            .lock()
            .unwrap()
            .unwrap_or(NotificationPermission::Default)
    }

    fn request_permission(&mut self) -> NotificationPermission {
        *self.prompts.lock().unwrap() += 1;
        let answer = if self.refuse {
            NotificationPermission::Denied
        } else {
            NotificationPermission::Granted
        };
        *self.answer.lock().unwrap() = Some(answer);
        answer
    }

    fn notify(&mut self, text: &str) -> Result<(), String> {
        self.shown.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
