//! A single log record and its line format.

use crate::log_level::LogLevel;
use chrono::Local;
use std::sync::Arc;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub(crate) struct LogMessage {
    pub timestamp: String,
    pub level: LogLevel,
    pub component: Option<Arc<str>>,
    pub message: String,
}

impl LogMessage {
    pub fn new(level: LogLevel, component: Option<Arc<str>>, message: String) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            level,
            component,
            message,
        }
    }

    /// `[timestamp] LEVEL [component: name]: message`, newline terminated.
    pub fn format(&self) -> String {
        match self.component {
            Some(ref component) => format!(
                "[{}] {} [component: {}]: {}\n",
                self.timestamp,
                self.level.as_str(),
                component,
                self.message
            ),
            None => format!(
                "[{}] {}: {}\n",
                self.timestamp,
                self.level.as_str(),
                self.message
            ),
        }
    }
}
