use chrono::Local;

/// One line of the room event log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub message: String,
    /// Local wall-clock time, `HH:MM:SS`.
    pub time: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            time: Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// Append-only room event log, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` stamped with the current time and returns the entry.
    pub fn append(&mut self, message: impl Into<String>) -> &LogEntry {
        self.entries.push(LogEntry::now(message));
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order_and_time_format() {
        let mut log = EventLog::new();
        log.append("Bob joined the room");
        let entry = log.append("Bob left the room").clone();

        assert_eq!(
            log.messages().collect::<Vec<_>>(),
            vec!["Bob joined the room", "Bob left the room"]
        );
        assert_eq!(entry.time.len(), 8);
        assert_eq!(entry.time.matches(':').count(), 2);
    }
}
