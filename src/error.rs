//! Error types for the room glue.
//!
//! The realtime service, the event store and the config file are opaque to
//! this crate, so each collapses its failures into one located message.

use derive_more::{Display, Error, From};

/// Realtime channel failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Channel error: {} at {}:{}", message, file, line)]
pub struct ChannelError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ChannelError {
    /// Creates a new channel error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Event store write failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Event log error: {} at {}:{}", message, file, line)]
pub struct EventLogError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl EventLogError {
    /// Creates a new event log error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Configuration failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new config error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    #[track_caller]
    fn from(err: toml::de::Error) -> Self {
        Self::new(format!("Failed to parse config: {}", err))
    }
}

impl From<std::io::Error> for ConfigError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("Failed to read config file: {}", err))
    }
}

/// Room session failure.
#[derive(Debug, Display, Error, From)]
pub enum SessionError {
    /// The channel could not be opened or written to.
    #[display("{_0}")]
    Channel(ChannelError),
    /// The session already ended.
    #[display("Room session is closed")]
    #[from(ignore)]
    Closed,
    /// The room was full and the local client was sent away.
    #[display("Room is full")]
    #[from(ignore)]
    Evicted,
}
