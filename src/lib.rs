//! serial-iface
//!
//! A backend-agnostic contract for RS-232-class serial ports, with a native
//! backend built on the `serialport` crate and an in-memory virtual backend
//! for deterministic tests without hardware.
//!
//! # Modules
//!
//! - `port`: the `SerialInterface` contract, both backends, the selector and
//!   the async bridge
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup
//! - `error`: application-level error type for the binary
//!
//! # Example
//!
//! ```
//! use serial_iface::port::{select, BackendKind, EventKind};
//!
//! let port = select(BackendKind::Virtual);
//! let handle = port.open("VPORT0", false)?;
//!
//! let events = port.wait_events(handle)?;
//! assert_eq!(events[0].kind, EventKind::Configured);
//!
//! port.write(handle, b"PING")?;
//! let echoed = port.read(handle, 4)?;
//! assert_eq!(echoed, b"PING");
//! port.close(handle)?;
//! # Ok::<(), serial_iface::PortError>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod port;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use error::{AppError, AppResult};
pub use port::{
    select, select_with, BackendKind, BackendOptions, BufferCounts, EventKind, EventRecord,
    LineStatus, NativeSerialInterface, PortError, PortHandle, PortParams, PortResult,
    SerialInterface, SerialInterfaceExt, VirtualSerialInterface,
};
