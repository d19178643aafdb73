//! Runs a session on its own thread.
//!
//! UI commands and collaborator events share the session queue, so they are
//! applied strictly one after another on that thread.

use super::{MeshSession, SessionCommand, SessionEvent};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

pub struct SessionHandle {
    tx: Sender<SessionEvent>,
    thread: Option<JoinHandle<()>>,
}

/// Moves `session` onto a dedicated thread and returns the handle driving it.
///
/// Subscribe to updates with [`MeshSession::subscribe`] before spawning.
pub fn spawn_session(session: MeshSession) -> SessionHandle {
    let tx = session.event_sender();
    let thread = thread::spawn(move || session.run());
    SessionHandle {
        tx,
        thread: Some(thread),
    }
}

impl SessionHandle {
    /// Queues a command. Returns `false` if the session thread has exited.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(SessionEvent::Command(command)).is_ok()
    }

    pub fn join(&self, display_name: &str, room: &str) -> bool {
        self.send(SessionCommand::Join {
            display_name: display_name.to_string(),
            room: room.to_string(),
            options: None,
        })
    }

    pub fn toggle_mute(&self) -> bool {
        self.send(SessionCommand::ToggleMute)
    }

    pub fn start_screen_share(&self) -> bool {
        self.send(SessionCommand::StartScreenShare)
    }

    pub fn stop_screen_share(&self) -> bool {
        self.send(SessionCommand::StopScreenShare)
    }

    pub fn leave(&self) -> bool {
        self.send(SessionCommand::Leave)
    }

    /// Leaves the room if joined and waits for the thread to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.tx.send(SessionEvent::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
