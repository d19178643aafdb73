//! The [`Logger`] front end.

use crate::error::Result;
use crate::log_level::LogLevel;
use crate::log_message::LogMessage;
use crate::log_writer::{LogCapture, Sink, spawn_writer_thread};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Sender, channel};

/// Thread-safe, non-blocking logger.
///
/// Clones and loggers derived through [`Logger::for_component`] share one
/// channel to the same writer thread, so every component of a session ends up
/// in a single, ordered file.
///
/// # Examples
///
/// ```no_run
/// use logging::{Logger, LogLevel};
///
/// let logger = Logger::new("roommesh.log".into(), LogLevel::Info).unwrap();
/// let mesh = logger.for_component("Mesh");
/// mesh.info("joined room 'standup'");
/// ```
#[derive(Clone)]
pub struct Logger {
    sender: Sender<LogMessage>,
    level: LogLevel,
    component: Option<Arc<str>>,
    console_output: bool,
}

impl Logger {
    /// Creates a logger writing to `log_path` (created if missing, appended to).
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn new(log_path: PathBuf, level: LogLevel) -> Result<Self> {
        let sink = Sink::file(&log_path)?;
        Ok(Self::spawn(sink, level, false))
    }

    /// Creates a file logger tagged with `component`, optionally echoing to stdout.
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn with_component(
        log_path: PathBuf,
        level: LogLevel,
        component: &str,
        console_output: bool,
    ) -> Result<Self> {
        let sink = Sink::file(&log_path)?;
        let mut logger = Self::spawn(sink, level, console_output);
        logger.component = Some(Arc::from(component));
        Ok(logger)
    }

    /// Creates a logger that keeps records in memory, plus the handle to read them.
    pub fn in_memory(level: LogLevel) -> (Self, LogCapture) {
        let (capture, sink) = LogCapture::new();
        (Self::spawn(sink, level, false), capture)
    }

    fn spawn(sink: Sink, level: LogLevel, console_output: bool) -> Self {
        let (sender, receiver) = channel();
        spawn_writer_thread(sink, receiver);
        Self {
            sender,
            level,
            component: None,
            console_output,
        }
    }

    /// Derives a logger for another component that shares this writer.
    pub fn for_component(&self, component: &str) -> Self {
        Self {
            sender: self.sender.clone(),
            level: self.level,
            component: Some(Arc::from(component)),
            console_output: self.console_output,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs an error message (always recorded).
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn log(&self, level: LogLevel, message: &str) {
        if level < self.level {
            return;
        }
        let msg = LogMessage::new(level, self.component.clone(), message.to_string());
        if self.console_output {
            print!("{}", msg.format());
        }
        // The writer only goes away at process teardown.
        let _ = self.sender.send(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(1);

    #[test]
    fn test_logger_creates_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let logger = Logger::new(log_path.clone(), LogLevel::Debug).unwrap();
        logger.info("Test message");
        thread::sleep(Duration::from_millis(50));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Test message"));
    }

    #[test]
    fn test_logger_respects_level() {
        let (logger, capture) = Logger::in_memory(LogLevel::Warn);
        logger.debug("Debug message");
        logger.info("Info message");
        logger.warn("Warn message");

        assert!(capture.wait_for("Warn message", WAIT));
        assert!(!capture.contains("Debug message"));
        assert!(!capture.contains("Info message"));
    }

    #[test]
    fn test_for_component_shares_writer() {
        let (logger, capture) = Logger::in_memory(LogLevel::Info);
        let vad = logger.for_component("Vad");
        let mesh = logger.for_component("Mesh");

        mesh.info("roster applied");
        vad.info("detector started");

        assert!(capture.wait_for("detector started", WAIT));
        let lines = capture.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[component: Mesh]: roster applied"));
        assert!(lines[1].contains("[component: Vad]: detector started"));
    }

    #[test]
    fn test_logger_clone_across_threads() {
        let (logger, capture) = Logger::in_memory(LogLevel::Info);
        let logger_clone = logger.for_component("Worker");

        thread::spawn(move || {
            logger_clone.info("Message from thread");
        })
        .join()
        .unwrap();

        logger.info("Message from main");

        assert!(capture.wait_for("Message from main", WAIT));
        assert!(capture.wait_for("Message from thread", WAIT));
    }

    #[test]
    fn test_with_component_file_logger() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("component.log");

        let logger =
            Logger::with_component(log_path.clone(), LogLevel::Debug, "Main", false).unwrap();
        assert_eq!(logger.level(), LogLevel::Debug);
        logger.error("signaling lost");
        thread::sleep(Duration::from_millis(50));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("ERROR [component: Main]: signaling lost"));
    }
}
