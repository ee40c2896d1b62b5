//! Port abstraction layer for serial communication.
//!
//! Provides the backend contract, the native and virtual backends that
//! implement it, the selector that picks between them, and an async bridge.

pub mod async_port;
pub mod buffer;
pub mod error;
pub mod native;
pub mod selector;
pub mod traits;
pub mod types;
pub mod virtual_port;

pub use async_port::{AsyncSerialInterface, BlockingInterfaceWrapper};
pub use buffer::{LoopbackBuffer, DEFAULT_TERMINATOR};
pub use error::{PortError, PortResult};
pub use native::NativeSerialInterface;
pub use selector::{select, select_with, BackendKind, BackendOptions};
pub use traits::{SerialInterface, SerialInterfaceExt};
pub use types::*;
pub use virtual_port::{VirtualSerialInterface, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
