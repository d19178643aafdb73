//! Fire-and-forget notification dispatch.
//!
//! The sink lives on a worker thread so a slow or blocking OS facility never
//! stalls the session. Dispatch without granted permission is skipped quietly;
//! sink failures are logged and go no further.

use super::{NotificationPermission, NotificationSink};
use logging::Logger;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

enum NotifierCommand {
    RequestPermission,
    Notify(String),
    Shutdown,
}

pub struct RoomNotifier {
    tx: Sender<NotifierCommand>,
    permission: Arc<Mutex<NotificationPermission>>,
    worker: Option<JoinHandle<()>>,
}

fn lock(permission: &Mutex<NotificationPermission>) -> MutexGuard<'_, NotificationPermission> {
    match permission.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RoomNotifier {
    pub fn new(sink: Box<dyn NotificationSink>, logger: &Logger) -> Self {
        let (tx, rx) = mpsc::channel();
        let permission = Arc::new(Mutex::new(sink.permission()));
        let logger = logger.for_component("Notify");

        let worker = {
            let permission = permission.clone();
            let mut sink = sink;
            thread::spawn(move || {
                // The user is prompted at most once per notifier
                let mut asked = false;
                while let Ok(command) = rx.recv() {
                    match command {
                        NotifierCommand::RequestPermission => {
                            let answer = match sink.permission() {
                                NotificationPermission::Default if !asked => {
                                    asked = true;
                                    sink.request_permission()
                                }
                                settled => settled,
                            };
                            logger.info(&format!("Notification permission: {}", answer));
                            *lock(&permission) = answer;
                        }
                        NotifierCommand::Notify(text) => {
                            let current = sink.permission();
                            *lock(&permission) = current;
                            if current != NotificationPermission::Granted {
                                logger.debug(&format!("Notification skipped ({}): {}", current, text));
                                continue;
                            }
                            if let Err(e) = sink.notify(&text) {
                                logger.warn(&format!("Notification failed: {}", e));
                            }
                        }
                        NotifierCommand::Shutdown => break,
                    }
                }
            })
        };

        Self {
            tx,
            permission,
            worker: Some(worker),
        }
    }

    /// Asks for permission unless the user already answered or was already
    /// asked. Does not wait for the answer.
    pub fn request_permission(&self) {
        let _ = self.tx.send(NotifierCommand::RequestPermission);
    }

    /// Queues a notification.
    pub fn notify(&self, text: impl Into<String>) {
        let _ = self.tx.send(NotifierCommand::Notify(text.into()));
    }

    /// Last permission state seen by the worker.
    pub fn permission(&self) -> NotificationPermission {
        *lock(&self.permission)
    }
}

impl Drop for RoomNotifier {
    fn drop(&mut self) {
        let _ = self.tx.send(NotifierCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::LogLevel;
    use std::time::Duration;

    #[derive(Clone)]
    struct RecordingSink {
        answer: NotificationPermission,
        state: Arc<Mutex<(NotificationPermission, Vec<String>, usize)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(answer: NotificationPermission) -> Self {
            Self {
                answer,
                state: Arc::new(Mutex::new((NotificationPermission::Default, Vec::new(), 0))),
                fail: false,
            }
        }

        fn shown(&self) -> Vec<String> {
            self.state.lock().unwrap().1.clone()
        }

        fn prompts(&self) -> usize {
            self.state.lock().unwrap().2
        }
    }

    impl NotificationSink for RecordingSink {
        fn permission(&self) -> NotificationPermission {
            self.state.lock().unwrap().0
        }

        fn request_permission(&mut self) -> NotificationPermission {
            let mut state = self.state.lock().unwrap();
            state.0 = self.answer;
            state.2 += 1;
            self.answer
        }

        fn notify(&mut self, text: &str) -> Result<(), String> {
            if self.fail {
                return Err("facility unavailable".to_string());
            }
            self.state.lock().unwrap().1.push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_granted_notifications_are_shown() {
        let (logger, _capture) = Logger::in_memory(LogLevel::Debug);
        let sink = RecordingSink::new(NotificationPermission::Granted);
        let notifier = RoomNotifier::new(Box::new(sink.clone()), &logger);

        notifier.request_permission();
        notifier.notify("Bob joined the room");
        drop(notifier);

        assert_eq!(sink.shown(), vec!["Bob joined the room"]);
    }

    #[test]
    fn test_denied_notifications_are_skipped() {
        let (logger, capture) = Logger::in_memory(LogLevel::Debug);
        let sink = RecordingSink::new(NotificationPermission::Denied);
        let notifier = RoomNotifier::new(Box::new(sink.clone()), &logger);

        notifier.request_permission();
        notifier.notify("Bob joined the room");
        drop(notifier);

        assert!(sink.shown().is_empty());
        assert!(capture.wait_for("Notification skipped", Duration::from_secs(1)));
    }

    #[test]
    fn test_permission_asked_once_granted() {
        let (logger, _capture) = Logger::in_memory(LogLevel::Info);
        let sink = RecordingSink::new(NotificationPermission::Granted);
        let notifier = RoomNotifier::new(Box::new(sink.clone()), &logger);

        notifier.request_permission();
        notifier.request_permission();
        drop(notifier);

        assert_eq!(sink.prompts(), 1);
    }

    #[test]
    fn test_refusal_is_not_asked_again() {
        let (logger, _capture) = Logger::in_memory(LogLevel::Info);
        let sink = RecordingSink::new(NotificationPermission::Denied);
        let notifier = RoomNotifier::new(Box::new(sink.clone()), &logger);

        notifier.request_permission();
        notifier.request_permission();
        notifier.request_permission();
        drop(notifier);

        assert_eq!(sink.prompts(), 1);
    }

    #[test]
    fn test_dismissed_prompt_is_not_repeated() {
        let (logger, _capture) = Logger::in_memory(LogLevel::Info);
        let sink = RecordingSink::new(NotificationPermission::Default);
        let notifier = RoomNotifier::new(Box::new(sink.clone()), &logger);

        notifier.request_permission();
        notifier.request_permission();
        drop(notifier);

        assert_eq!(sink.prompts(), 1);
    }

    #[test]
    fn test_sink_failure_is_logged() {
        let (logger, capture) = Logger::in_memory(LogLevel::Info);
        let mut sink = RecordingSink::new(NotificationPermission::Granted);
        sink.fail = true;
        let notifier = RoomNotifier::new(Box::new(sink), &logger);

        notifier.request_permission();
        notifier.notify("Carol left the room");

        assert!(capture.wait_for("Notification failed", Duration::from_secs(1)));
        assert_eq!(notifier.permission(), NotificationPermission::Granted);
    }
}
