//! Error handling for printkit
//!
//! Provides error types for all layers of the library:
//! - Transport errors (serial port related)
//! - Protocol errors (firmware detection and dialect selection)
//! - Job errors (print file access)
//! - State errors (actions not permitted in the current state)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Transport error type
///
/// Represents failures of the serial byte stream. Any of these during an
/// active session is fatal for that session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The requested port does not exist
    #[error("Port not found: {port}")]
    NotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// The port exists but is held by another process
    #[error("Port busy: {port}")]
    Busy {
        /// The name of the port that is in use.
        port: String,
    },

    /// Read or write failure on an open port
    #[error("Serial I/O error: {reason}")]
    Io {
        /// The reason for the I/O failure.
        reason: String,
    },

    /// The connection closed unexpectedly
    #[error("Connection closed")]
    Closed,
}

/// Protocol error type
///
/// Represents failures of the firmware handshake rather than of the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No known firmware identified itself within the detection window
    #[error("Firmware not detected within {timeout_ms}ms")]
    DetectionTimeout {
        /// The detection window in milliseconds.
        timeout_ms: u64,
    },

    /// A dialect was requested by a name that is not registered
    #[error("Unknown firmware dialect: {name}")]
    UnknownDialect {
        /// The requested dialect name.
        name: String,
    },
}

/// Print job error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The G-code file could not be opened
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that could not be opened.
        path: String,
    },

    /// The G-code file failed to read mid-job
    #[error("Read error in print file: {reason}")]
    Read {
        /// The reason the read failed.
        reason: String,
    },
}

/// State error type
///
/// Returned synchronously when an action is not permitted in the current
/// printer state. The state machine is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The action cannot run in the current state
    #[error("{action} is not permitted while {state}")]
    NotPermitted {
        /// The rejected action.
        action: String,
        /// The printer state at the time of the call.
        state: String,
    },
}

impl StateError {
    /// Create a `NotPermitted` error for an action rejected in a state
    pub fn not_permitted(action: impl Into<String>, state: impl std::fmt::Display) -> Self {
        StateError::NotPermitted {
            action: action.into(),
            state: state.to_string(),
        }
    }
}

/// Main error type for printkit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Print job error
    #[error(transparent)]
    Job(#[from] JobError),

    /// State error
    #[error(transparent)]
    State(#[from] StateError),
}

impl Error {
    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Check if this is a job error
    pub fn is_job_error(&self) -> bool {
        matches!(self, Error::Job(_))
    }

    /// Check if this is a state error
    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::State(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
