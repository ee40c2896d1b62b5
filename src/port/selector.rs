//! Backend selection.
//!
//! Maps a requested [`BackendKind`] to a boxed [`SerialInterface`]. Callers
//! never see the concrete backend type, and no port is opened here.

use super::buffer::DEFAULT_TERMINATOR;
use super::native::NativeSerialInterface;
use super::traits::SerialInterface;
use super::virtual_port::{VirtualSerialInterface, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Real ports through the operating system.
    #[default]
    Native,
    /// In-memory loopback ports.
    Virtual,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Virtual => write!(f, "virtual"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "virtual" | "vm" => Ok(Self::Virtual),
            other => Err(format!("unknown backend kind '{other}'")),
        }
    }
}

/// Tunables applied when constructing a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    /// Terminator the virtual backend appends to every write.
    pub terminator: Vec<u8>,
    /// Bound on each sleep inside `wait_events`.
    pub poll_interval: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            terminator: DEFAULT_TERMINATOR.to_vec(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Construct a default-configured backend of the requested kind.
pub fn select(kind: BackendKind) -> Box<dyn SerialInterface> {
    select_with(kind, &BackendOptions::default())
}

/// Construct a backend of the requested kind with explicit options.
pub fn select_with(kind: BackendKind, options: &BackendOptions) -> Box<dyn SerialInterface> {
    match kind {
        BackendKind::Native => {
            Box::new(NativeSerialInterface::new().with_poll_interval(options.poll_interval))
        }
        BackendKind::Virtual => Box::new(
            VirtualSerialInterface::new()
                .with_terminator(&options.terminator)
                .with_poll_interval(options.poll_interval),
        ),
    }
}
