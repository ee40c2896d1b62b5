//! The backend contract.
//!
//! Defines the `SerialInterface` trait that both the native (OS-backed) and the
//! virtual (in-memory) backends implement, so callers can drive either one
//! through the same handle-based API.

use super::error::PortResult;
use super::selector::BackendKind;
use super::types::{BufferCounts, EventRecord, LineStatus, PortHandle, PortParams};

/// Capability set every serial backend must provide.
///
/// All methods take `&self`: backends keep their sessions behind interior
/// locks so that one instance can be shared in an `Arc` and a `close` issued
/// from one thread can release a `wait_events` blocked in another.
///
/// Every operation that takes a handle fails with
/// [`PortError::InvalidHandle`](super::PortError::InvalidHandle) when the handle
/// has no live session.
#[cfg_attr(test, mockall::automock)]
pub trait SerialInterface: Send + Sync + std::fmt::Debug {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Open `port_name` and create a session for it.
    ///
    /// `exclusive` is advisory; backends without OS-level locking ignore it.
    fn open(&self, port_name: &str, exclusive: bool) -> PortResult<PortHandle>;

    /// Discard buffered input and/or output according to `flags`
    /// (see [`purge`](super::types::purge)).
    fn purge(&self, handle: PortHandle, flags: u32) -> PortResult<()>;

    /// Destroy the session. Any `wait_events` in flight on it returns
    /// `Interrupted`.
    fn close(&self, handle: PortHandle) -> PortResult<()>;

    /// Block until the port reports at least one event.
    ///
    /// Never returns an empty vector on success.
    fn wait_events(&self, handle: PortHandle) -> PortResult<Vec<EventRecord>>;

    /// Release a `wait_events` blocked on `handle`.
    ///
    /// If no wait is in flight, the next one returns `Interrupted` immediately.
    fn cancel_wait(&self, handle: PortHandle) -> PortResult<()>;

    /// Withdraw a cancellation that no wait has consumed yet.
    fn clear_cancel(&self, handle: PortHandle) -> PortResult<()>;

    fn set_rts(&self, handle: PortHandle, on: bool) -> PortResult<()>;

    fn set_dtr(&self, handle: PortHandle, on: bool) -> PortResult<()>;

    /// Return up to `count` bytes that are already available. Never blocks.
    fn read(&self, handle: PortHandle, count: usize) -> PortResult<Vec<u8>>;

    /// Queue all of `data` for transmission, or fail without writing any of it.
    fn write(&self, handle: PortHandle, data: &[u8]) -> PortResult<()>;

    fn buffer_counts(&self, handle: PortHandle) -> PortResult<BufferCounts>;

    /// Store a flow-control mask (see [`flow_control`](super::types::flow_control)).
    fn set_flow_control_mode(&self, handle: PortHandle, mask: u32) -> PortResult<()>;

    fn flow_control_mode(&self, handle: PortHandle) -> PortResult<u32>;

    /// Names of the ports this backend can address, in no particular order.
    fn list_port_names(&self) -> PortResult<Vec<String>>;

    fn lines_status(&self, handle: PortHandle) -> PortResult<LineStatus>;

    /// Hold the line in the break condition for `duration_ms`.
    fn send_break(&self, handle: PortHandle, duration_ms: u32) -> PortResult<()>;

    /// Reconfigure the session, including the initial RTS/DTR levels.
    fn set_params(&self, handle: PortHandle, params: &PortParams) -> PortResult<()>;

    /// Store an event mask (see [`events`](super::types::events)).
    fn set_events_mask(&self, handle: PortHandle, mask: u32) -> PortResult<()>;

    fn events_mask(&self, handle: PortHandle) -> PortResult<u32>;
}

/// Convenience operations built only from the contract.
pub trait SerialInterfaceExt: SerialInterface {
    /// Read everything currently queued on the input side.
    fn read_available(&self, handle: PortHandle) -> PortResult<Vec<u8>> {
        let counts = self.buffer_counts(handle)?;
        if counts.input == 0 {
            return Ok(Vec::new());
        }
        self.read(handle, counts.input)
    }

    /// Open `port_name` and apply `params`, closing it again if that fails.
    fn open_configured(
        &self,
        port_name: &str,
        exclusive: bool,
        params: &PortParams,
    ) -> PortResult<PortHandle> {
        let handle = self.open(port_name, exclusive)?;
        if let Err(e) = self.set_params(handle, params) {
            let _ = self.close(handle);
            return Err(e);
        }
        Ok(handle)
    }
}

impl<T: SerialInterface + ?Sized> SerialInterfaceExt for T {}
