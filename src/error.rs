//! Error types for parksim.
//!
//! All errors are strongly typed using thiserror. Denials are not errors:
//! a denied reservation is a valid decision outcome carried in
//! [`crate::admission::Decision`], never through this module.

use thiserror::Error;

use crate::channel::ChannelError;

/// Startup-time configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Operating hours outside the supported day.
    #[error("Hour {value} is outside the supported range [{min}, {max}]")]
    HourOutOfRange {
        /// The offending hour.
        value: u8,
        /// Earliest supported hour.
        min: u8,
        /// Latest supported hour.
        max: u8,
    },

    /// Opening hour after closing hour.
    #[error("Opening hour {open} must not be after closing hour {close}")]
    InvertedHours {
        /// Configured opening hour.
        open: u8,
        /// Configured closing hour.
        close: u8,
    },

    /// Capacity must admit at least one person.
    #[error("Capacity must be greater than zero")]
    ZeroCapacity,

    /// Tick interval must be positive.
    #[error("Tick interval must be greater than zero")]
    ZeroTick,
}

/// Errors raised while decoding inbound wire messages.
///
/// Every variant maps to "log and drop the line": a malformed message never
/// crashes intake and never reaches the controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line did not start with a known message tag.
    #[error("Unknown message tag in line: {line}")]
    UnknownTag {
        /// The offending line (truncated by the caller if oversized).
        line: String,
    },

    /// Wrong number of colon-separated fields for the tag.
    #[error("Message '{tag}' expects {expected} fields, got {actual}")]
    FieldCount {
        /// Message tag.
        tag: &'static str,
        /// Expected field count.
        expected: usize,
        /// Observed field count.
        actual: usize,
    },

    /// A numeric field failed to parse.
    #[error("Field '{field}' is not a valid number: {value}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Raw field text.
        value: String,
    },

    /// A name field was empty or contained a delimiter.
    #[error("Field '{field}' is empty or contains a reserved character")]
    InvalidName {
        /// Field name.
        field: &'static str,
    },
}

/// Top-level error type for parksim operations.
#[derive(Debug, Error)]
pub enum ParkError {
    /// Configuration validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Inbound message decoding failed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Message channel failure.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A runtime thread ended abnormally.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Filesystem or pipe I/O failure outside the channel abstraction.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParkError {
    /// Creates a runtime error from any displayable message.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}

/// Convenience result alias used throughout the crate.
pub type ParkResult<T> = Result<T, ParkError>;
