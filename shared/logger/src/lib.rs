//! Non-blocking, component-scoped logging shared by the RoomMesh crates.
//!
//! A [`Logger`] hands every record to a dedicated writer thread through a
//! channel, so callers on the session thread never wait on I/O. Records go
//! either to an append-mode file or to an in-memory buffer that tests can
//! inspect through a [`LogCapture`].

pub mod error;
mod log_level;
mod log_message;
mod log_writer;
mod logger;

pub use error::{LoggingError, Result};
pub use log_level::LogLevel;
pub use log_writer::LogCapture;
pub use logger::Logger;
