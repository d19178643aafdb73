//! Writer thread and the sinks it drains into.

use crate::error::Result;
use crate::log_message::LogMessage;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Destination of formatted records.
pub(crate) enum Sink {
    File(File),
    Memory(Arc<Mutex<Vec<String>>>),
}

impl Sink {
    /// Opens or creates the file in append mode.
    pub fn file(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Sink::File(file))
    }

    fn write_message(&mut self, message: &LogMessage) {
        match self {
            Sink::File(file) => {
                if let Err(e) = file.write_all(message.format().as_bytes()) {
                    eprintln!("Error writing log: {}", e);
                    return;
                }
                if let Err(e) = file.flush() {
                    eprintln!("Error flushing log: {}", e);
                }
            }
            Sink::Memory(lines) => {
                let mut lines = match lines.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                lines.push(message.format().trim_end().to_string());
            }
        }
    }
}

/// Spawns the writer thread; it exits once every sender is dropped.
pub(crate) fn spawn_writer_thread(mut sink: Sink, receiver: Receiver<LogMessage>) {
    thread::spawn(move || {
        for message in receiver {
            sink.write_message(&message);
        }
    });
}

/// Read side of an in-memory logger.
///
/// Records arrive asynchronously, so assertions should go through
/// [`LogCapture::wait_for`] rather than reading [`LogCapture::lines`] right
/// after logging.
#[derive(Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    pub(crate) fn new() -> (Self, Sink) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                lines: lines.clone(),
            },
            Sink::Memory(lines),
        )
    }

    /// Formatted records written so far, without trailing newlines.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    /// Polls until a record containing `needle` shows up or `timeout` elapses.
    pub fn wait_for(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.contains(needle) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(CAPTURE_POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_level::LogLevel;
    use std::fs;
    use std::sync::mpsc::channel;
    use tempfile::tempdir;

    #[test]
    fn test_file_sink_creates_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("mesh.log");

        assert!(Sink::file(&log_path).is_ok());
        assert!(log_path.exists());
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("mesh.log");
        fs::write(&log_path, "previous run\n").unwrap();

        let mut sink = Sink::file(&log_path).unwrap();
        sink.write_message(&LogMessage::new(LogLevel::Info, None, "second run".into()));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.starts_with("previous run\n"));
        assert!(content.contains("INFO: second run"));
    }

    #[test]
    fn test_memory_sink_through_writer_thread() {
        let (capture, sink) = LogCapture::new();
        let (sender, receiver) = channel();
        spawn_writer_thread(sink, receiver);

        sender
            .send(LogMessage::new(LogLevel::Debug, None, "queued".into()))
            .unwrap();

        assert!(capture.wait_for("DEBUG: queued", Duration::from_secs(1)));
        assert!(!capture.wait_for("never logged", Duration::from_millis(20)));
    }
}
