use std::fmt;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while locating, reading or parsing a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file was not found.
    FileNotFound(String),

    /// The file exists but could not be read.
    ReadError(String),

    /// A line is neither a comment, blank, nor `key=value`.
    Syntax { line: usize, content: String },

    /// A key holds a value of the wrong shape.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            ConfigError::ReadError(msg) => {
                write!(f, "Failed to read configuration file: {}", msg)
            }
            ConfigError::Syntax { line, content } => {
                write!(f, "Line {}: expected key=value, got '{}'", line, content)
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{}' for key '{}'", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
