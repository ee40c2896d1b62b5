//! Port-specific error types.
//!
//! Every contract operation reports failure through [`PortError`]. The virtual
//! backend only ever produces the first four variants; the I/O variants come
//! from the native backend and the async bridge.

use super::types::PortHandle;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The handle does not correspond to a live session.
    #[error("Invalid port handle {0}")]
    InvalidHandle(PortHandle),

    /// The port could not be acquired.
    #[error("Port '{port}' is unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// A blocking wait was cancelled by a close or an explicit cancellation.
    #[error("Wait was interrupted")]
    Interrupted,

    /// The operation or value is not meaningful for this backend.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Result type for contract operations.
pub type PortResult<T> = Result<T, PortError>;

impl PortError {
    /// Create a PortUnavailable error.
    pub fn unavailable(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PortUnavailable {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Create an Unsupported error from a message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, Self::InvalidHandle(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
