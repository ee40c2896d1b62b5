//! Application-level error type for the diagnostic binary.

use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// Unified application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// A command needed a port name and none was given or configured.
    #[error("No port specified and no serial.default_port configured")]
    NoPortSpecified,

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result type for application commands.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::NoPortSpecified => 2,
            Self::Port(PortError::PortUnavailable { .. }) => 3,
            Self::Port(_) => 4,
            Self::Output(_) => 1,
        }
    }
}
