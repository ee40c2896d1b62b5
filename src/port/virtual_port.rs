//! Virtual serial backend for testing.
//!
//! Provides a `VirtualSerialInterface` that emulates serial ports entirely in
//! memory. Each open port gets its own session record: a loopback byte stream,
//! stored line parameters, control and status line registers, and a condition
//! variable that `wait_events` blocks on.
//!
//! Writes are looped straight back to the readable side, framed by a
//! terminator, so read-side logic can be exercised without a peer process.

use super::buffer::{LoopbackBuffer, DEFAULT_TERMINATOR};
use super::error::{PortError, PortResult};
use super::selector::BackendKind;
use super::traits::SerialInterface;
use super::types::{
    BufferCounts, ControlLines, EventKind, EventRecord, LineStatus, PortHandle, PortParams,
};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Upper bound on a single condvar sleep inside `wait_events`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Shortest poll interval a backend accepts; smaller values are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Where a session is in its event lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitPhase {
    /// The configuration event has not been reported yet.
    Configuring,
    /// Waits block until the stream holds data.
    Streaming,
}

#[derive(Debug)]
struct SessionState {
    params: PortParams,
    control: ControlLines,
    lines: LineStatus,
    flow_control: u32,
    event_mask: u32,
    stream: LoopbackBuffer,
    phase: WaitPhase,
    closed: bool,
    cancel_pending: bool,
}

#[derive(Debug)]
struct VirtualSession {
    name: String,
    state: Mutex<SessionState>,
    wake: Condvar,
}

impl VirtualSession {
    fn new(name: &str, terminator: &[u8]) -> Self {
        let params = PortParams::default();
        Self {
            name: name.to_string(),
            state: Mutex::new(SessionState {
                control: ControlLines {
                    rts: params.rts,
                    dtr: params.dtr,
                },
                params,
                lines: LineStatus::default(),
                flow_control: 0,
                event_mask: 0,
                stream: LoopbackBuffer::new(terminator),
                phase: WaitPhase::Configuring,
                closed: false,
                cancel_pending: false,
            }),
            wake: Condvar::new(),
        }
    }
}

/// In-memory serial backend.
///
/// # Example
/// ```
/// use serial_iface::port::{SerialInterface, VirtualSerialInterface};
///
/// let port = VirtualSerialInterface::new().with_terminator(b"\r\n");
/// let handle = port.open("VPORT0", false).unwrap();
///
/// port.write(handle, b"PING").unwrap();
/// assert_eq!(port.read(handle, 10).unwrap(), b"PING\r\n");
///
/// port.close(handle).unwrap();
/// assert!(port.read(handle, 10).is_err());
/// ```
pub struct VirtualSerialInterface {
    sessions: Mutex<HashMap<PortHandle, Arc<VirtualSession>>>,
    next_handle: AtomicU64,
    last_opened: Mutex<Option<String>>,
    terminator: Vec<u8>,
    poll_interval: Duration,
}

impl Default for VirtualSerialInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualSerialInterface {
    /// Create a backend using the platform line separator as terminator.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            last_opened: Mutex::new(None),
            terminator: DEFAULT_TERMINATOR.to_vec(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Use `terminator` to frame every subsequent write.
    pub fn with_terminator(mut self, terminator: &[u8]) -> Self {
        self.terminator = terminator.to_vec();
        self
    }

    /// Bound each condvar sleep in `wait_events` by `interval`.
    ///
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it so a wait never
    /// spins.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn terminator(&self) -> &[u8] {
        &self.terminator
    }

    /// Number of sessions currently open.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Drive the simulated status lines, as a peer would.
    pub fn set_line_status(&self, handle: PortHandle, lines: LineStatus) -> PortResult<()> {
        self.with_state(handle, |state| state.lines = lines)
    }

    /// Current RTS/DTR output levels.
    pub fn control_lines(&self, handle: PortHandle) -> PortResult<ControlLines> {
        self.with_state(handle, |state| state.control)
    }

    /// Parameters last applied with `set_params`.
    pub fn params(&self, handle: PortHandle) -> PortResult<PortParams> {
        self.with_state(handle, |state| state.params.clone())
    }

    fn session(&self, handle: PortHandle) -> PortResult<Arc<VirtualSession>> {
        self.sessions
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(PortError::InvalidHandle(handle))
    }

    /// Run `f` against the live state of `handle`.
    fn with_state<T>(
        &self,
        handle: PortHandle,
        f: impl FnOnce(&mut SessionState) -> T,
    ) -> PortResult<T> {
        let session = self.session(handle)?;
        let mut state = session.state.lock();
        // close() may have won the race after the table lookup
        if state.closed {
            return Err(PortError::InvalidHandle(handle));
        }
        Ok(f(&mut state))
    }
}

impl SerialInterface for VirtualSerialInterface {
    fn kind(&self) -> BackendKind {
        BackendKind::Virtual
    }

    fn open(&self, port_name: &str, exclusive: bool) -> PortResult<PortHandle> {
        if port_name.is_empty() {
            return Err(PortError::unavailable(port_name, "empty port name"));
        }

        let mut sessions = self.sessions.lock();
        if sessions.values().any(|s| s.name == port_name) {
            return Err(PortError::unavailable(port_name, "port is already open"));
        }

        let handle = PortHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        sessions.insert(
            handle,
            Arc::new(VirtualSession::new(port_name, &self.terminator)),
        );
        drop(sessions);

        *self.last_opened.lock() = Some(port_name.to_string());

        if exclusive {
            trace!("Exclusive access ignored for virtual port {}", port_name);
        }
        debug!("Opened virtual port {} as {}", port_name, handle);
        Ok(handle)
    }

    fn purge(&self, handle: PortHandle, flags: u32) -> PortResult<()> {
        // one loopback stream backs both directions, so any purge empties it
        self.with_state(handle, |state| {
            trace!("Purging virtual port {} (flags {:#x})", handle, flags);
            state.stream.clear();
        })
    }

    fn close(&self, handle: PortHandle) -> PortResult<()> {
        let session = self
            .sessions
            .lock()
            .remove(&handle)
            .ok_or(PortError::InvalidHandle(handle))?;

        let mut state = session.state.lock();
        state.closed = true;
        state.stream.clear();
        drop(state);
        session.wake.notify_all();

        debug!("Closed virtual port {} ({})", session.name, handle);
        Ok(())
    }

    fn wait_events(&self, handle: PortHandle) -> PortResult<Vec<EventRecord>> {
        let session = self.session(handle)?;
        let mut state = session.state.lock();
        if state.closed {
            return Err(PortError::InvalidHandle(handle));
        }

        loop {
            if state.closed || state.cancel_pending {
                state.cancel_pending = false;
                debug!("Wait on {} interrupted", handle);
                return Err(PortError::Interrupted);
            }

            if state.phase == WaitPhase::Configuring {
                state.phase = WaitPhase::Streaming;
                return Ok(vec![EventRecord::new(EventKind::Configured, 1)]);
            }

            if !state.stream.is_empty() {
                let queued = u32::try_from(state.stream.len()).unwrap_or(u32::MAX);
                trace!("Wait on {} woke with {} bytes queued", handle, queued);
                return Ok(vec![EventRecord::new(EventKind::RxChar, queued)]);
            }

            session.wake.wait_for(&mut state, self.poll_interval);
        }
    }

    fn cancel_wait(&self, handle: PortHandle) -> PortResult<()> {
        let session = self.session(handle)?;
        let mut state = session.state.lock();
        if state.closed {
            return Err(PortError::InvalidHandle(handle));
        }
        state.cancel_pending = true;
        drop(state);
        session.wake.notify_all();
        Ok(())
    }

    fn clear_cancel(&self, handle: PortHandle) -> PortResult<()> {
        self.with_state(handle, |state| state.cancel_pending = false)
    }

    fn set_rts(&self, handle: PortHandle, on: bool) -> PortResult<()> {
        self.with_state(handle, |state| state.control.rts = on)
    }

    fn set_dtr(&self, handle: PortHandle, on: bool) -> PortResult<()> {
        self.with_state(handle, |state| state.control.dtr = on)
    }

    fn read(&self, handle: PortHandle, count: usize) -> PortResult<Vec<u8>> {
        self.with_state(handle, |state| state.stream.take(count))
    }

    fn write(&self, handle: PortHandle, data: &[u8]) -> PortResult<()> {
        let session = self.session(handle)?;
        let mut state = session.state.lock();
        if state.closed {
            return Err(PortError::InvalidHandle(handle));
        }
        state.stream.push_framed(data);
        drop(state);
        session.wake.notify_all();
        Ok(())
    }

    fn buffer_counts(&self, handle: PortHandle) -> PortResult<BufferCounts> {
        self.with_state(handle, |state| BufferCounts {
            input: state.stream.len(),
            output: 0,
        })
    }

    fn set_flow_control_mode(&self, handle: PortHandle, mask: u32) -> PortResult<()> {
        self.with_state(handle, |state| state.flow_control = mask)
    }

    fn flow_control_mode(&self, handle: PortHandle) -> PortResult<u32> {
        self.with_state(handle, |state| state.flow_control)
    }

    fn list_port_names(&self) -> PortResult<Vec<String>> {
        Ok(self.last_opened.lock().iter().cloned().collect())
    }

    fn lines_status(&self, handle: PortHandle) -> PortResult<LineStatus> {
        self.with_state(handle, |state| state.lines)
    }

    fn send_break(&self, handle: PortHandle, duration_ms: u32) -> PortResult<()> {
        self.with_state(handle, |_| {
            trace!("Break of {}ms on virtual port {}", duration_ms, handle);
        })
    }

    fn set_params(&self, handle: PortHandle, params: &PortParams) -> PortResult<()> {
        self.with_state(handle, |state| {
            state.params = params.clone();
            state.control = ControlLines {
                rts: params.rts,
                dtr: params.dtr,
            };
        })?;
        debug!(
            "Virtual port {} configured: {} baud, {} data bits",
            handle, params.baud_rate, params.data_bits
        );
        Ok(())
    }

    fn set_events_mask(&self, handle: PortHandle, mask: u32) -> PortResult<()> {
        self.with_state(handle, |state| state.event_mask = mask)
    }

    fn events_mask(&self, handle: PortHandle) -> PortResult<u32> {
        self.with_state(handle, |state| state.event_mask)
    }
}

impl std::fmt::Debug for VirtualSerialInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualSerialInterface")
            .field("sessions", &self.session_count())
            .field("terminator", &self.terminator)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
