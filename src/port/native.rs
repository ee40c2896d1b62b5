//! Native serial backend.
//!
//! Forwards every contract operation to the operating system through the
//! `serialport` crate. Each open port is one session holding the boxed
//! `serialport::SerialPort`; `wait_events` polls the device at a bounded
//! interval and is released early by `close` or `cancel_wait`.

use super::error::{PortError, PortResult};
use super::selector::BackendKind;
use super::traits::SerialInterface;
use super::types::{
    flow_control, purge, BufferCounts, EventKind, EventRecord, LineStatus, Parity, PortHandle,
    PortParams, StopBits,
};
use super::virtual_port::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Baud rate used between `open` and the first `set_params`.
const OPEN_BAUD_RATE: u32 = 9600;

/// Per-call I/O timeout; reads never ask for more than is already buffered.
const IO_TIMEOUT: Duration = Duration::from_millis(50);

impl TryFrom<Parity> for serialport::Parity {
    type Error = PortError;

    fn try_from(parity: Parity) -> Result<Self, Self::Error> {
        match parity {
            Parity::None => Ok(serialport::Parity::None),
            Parity::Odd => Ok(serialport::Parity::Odd),
            Parity::Even => Ok(serialport::Parity::Even),
            other => Err(PortError::unsupported(format!("parity {other:?}"))),
        }
    }
}

impl TryFrom<StopBits> for serialport::StopBits {
    type Error = PortError;

    fn try_from(bits: StopBits) -> Result<Self, Self::Error> {
        match bits {
            StopBits::One => Ok(serialport::StopBits::One),
            StopBits::Two => Ok(serialport::StopBits::Two),
            StopBits::OnePointFive => Err(PortError::unsupported("1.5 stop bits")),
        }
    }
}

fn data_bits(bits: u8) -> PortResult<serialport::DataBits> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(PortError::unsupported(format!("{other} data bits"))),
    }
}

/// Collapse a flow-control mask to the modes the OS layer understands.
fn flow_control_for(mask: u32) -> serialport::FlowControl {
    if mask & (flow_control::RTSCTS_IN | flow_control::RTSCTS_OUT) != 0 {
        serialport::FlowControl::Hardware
    } else if mask & (flow_control::XONXOFF_IN | flow_control::XONXOFF_OUT) != 0 {
        serialport::FlowControl::Software
    } else {
        serialport::FlowControl::None
    }
}

fn clear_buffer_for(flags: u32) -> Option<serialport::ClearBuffer> {
    let rx = flags & purge::RX_ANY != 0;
    let tx = flags & purge::TX_ANY != 0;
    match (rx, tx) {
        (true, true) => Some(serialport::ClearBuffer::All),
        (true, false) => Some(serialport::ClearBuffer::Input),
        (false, true) => Some(serialport::ClearBuffer::Output),
        (false, false) => None,
    }
}

#[cfg(unix)]
fn open_device(
    port_name: &str,
    exclusive: bool,
) -> Result<Box<dyn serialport::SerialPort>, serialport::Error> {
    let mut port = serialport::new(port_name, OPEN_BAUD_RATE)
        .timeout(IO_TIMEOUT)
        .open_native()?;
    port.set_exclusive(exclusive)?;
    Ok(Box::new(port))
}

#[cfg(not(unix))]
fn open_device(
    port_name: &str,
    _exclusive: bool,
) -> Result<Box<dyn serialport::SerialPort>, serialport::Error> {
    // COM ports are always opened for exclusive access
    serialport::new(port_name, OPEN_BAUD_RATE)
        .timeout(IO_TIMEOUT)
        .open()
}

/// Classify a failed open. Every kind is `PortUnavailable`; the reason says
/// why.
fn open_error(port_name: &str, e: serialport::Error) -> PortError {
    let reason = match e.kind() {
        serialport::ErrorKind::NoDevice => "no such device".to_string(),
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => "no such device".to_string(),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            "permission denied".to_string()
        }
        serialport::ErrorKind::InvalidInput => format!("invalid port settings: {}", e),
        _ => e.to_string(),
    };
    PortError::unavailable(port_name, reason)
}

fn read_lines(port: &mut dyn serialport::SerialPort) -> PortResult<LineStatus> {
    Ok(LineStatus {
        cts: port.read_clear_to_send()?,
        dsr: port.read_data_set_ready()?,
        ring: port.read_ring_indicator()?,
        rlsd: port.read_carrier_detect()?,
    })
}

struct NativeState {
    port: Box<dyn serialport::SerialPort>,
    flow_control: u32,
    event_mask: u32,
    /// Status lines seen by the previous wait, for change detection.
    last_lines: Option<LineStatus>,
    closed: bool,
    cancel_pending: bool,
}

struct NativeSession {
    name: String,
    state: Mutex<NativeState>,
    wake: Condvar,
}

/// Serial backend talking to real hardware.
pub struct NativeSerialInterface {
    sessions: Mutex<HashMap<PortHandle, Arc<NativeSession>>>,
    /// Serializes `open` without blocking lookups on the session table.
    open_lock: Mutex<()>,
    next_handle: AtomicU64,
    poll_interval: Duration,
}

impl Default for NativeSerialInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeSerialInterface {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            open_lock: Mutex::new(()),
            next_handle: AtomicU64::new(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Interval between device polls inside `wait_events`, at least
    /// [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn session(&self, handle: PortHandle) -> PortResult<Arc<NativeSession>> {
        self.sessions
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(PortError::InvalidHandle(handle))
    }

    fn with_state<T>(
        &self,
        handle: PortHandle,
        f: impl FnOnce(&mut NativeState) -> PortResult<T>,
    ) -> PortResult<T> {
        let session = self.session(handle)?;
        let mut state = session.state.lock();
        if state.closed {
            return Err(PortError::InvalidHandle(handle));
        }
        f(&mut state)
    }

    /// Events currently pending on the device, filtered by the session mask.
    fn poll_events(state: &mut NativeState) -> PortResult<Vec<EventRecord>> {
        let mut events = Vec::new();

        let queued = state.port.bytes_to_read()?;
        if queued > 0 {
            events.push(EventRecord::new(EventKind::RxChar, queued));
        }

        let lines = read_lines(state.port.as_mut())?;
        if let Some(previous) = state.last_lines.replace(lines) {
            events.extend(lines.changes_since(&previous));
        }

        let mask = state.event_mask;
        events.retain(|event| event.kind.selected_by(mask));
        Ok(events)
    }
}

impl SerialInterface for NativeSerialInterface {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn open(&self, port_name: &str, exclusive: bool) -> PortResult<PortHandle> {
        // held until the session is registered, so two opens of one name
        // cannot both pass the duplicate check
        let _guard = self.open_lock.lock();
        if self.sessions.lock().values().any(|s| s.name == port_name) {
            return Err(PortError::unavailable(port_name, "port is already open"));
        }

        debug!("Opening serial port: {}", port_name);
        let port = open_device(port_name, exclusive).map_err(|e| {
            warn!("Failed to open serial port {}: {}", port_name, e);
            open_error(port_name, e)
        })?;

        let handle = PortHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let session = NativeSession {
            name: port_name.to_string(),
            state: Mutex::new(NativeState {
                port,
                flow_control: flow_control::NONE,
                event_mask: 0,
                last_lines: None,
                closed: false,
                cancel_pending: false,
            }),
            wake: Condvar::new(),
        };
        self.sessions.lock().insert(handle, Arc::new(session));

        debug!("Serial port {} opened as {}", port_name, handle);
        Ok(handle)
    }

    fn purge(&self, handle: PortHandle, flags: u32) -> PortResult<()> {
        self.with_state(handle, |state| {
            if let Some(which) = clear_buffer_for(flags) {
                state.port.clear(which)?;
            }
            Ok(())
        })
    }

    fn close(&self, handle: PortHandle) -> PortResult<()> {
        let session = self
            .sessions
            .lock()
            .remove(&handle)
            .ok_or(PortError::InvalidHandle(handle))?;

        session.state.lock().closed = true;
        session.wake.notify_all();
        // the device is released once the last in-flight call drops its Arc
        debug!("Closed serial port {} ({})", session.name, handle);
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
                return Err(PortError::Interrupted);
            }

            let events = Self::poll_events(&mut state)?;
            if !events.is_empty() {
                return Ok(events);
            }

            session.wake.wait_for(&mut state, self.poll_interval);
        }
    }

    fn cancel_wait(&self, handle: PortHandle) -> PortResult<()> {
        let session = self.session(handle)?;
        session.state.lock().cancel_pending = true;
        session.wake.notify_all();
        Ok(())
    }

    fn clear_cancel(&self, handle: PortHandle) -> PortResult<()> {
        self.with_state(handle, |state| {
            state.cancel_pending = false;
            Ok(())
        })
    }

    fn set_rts(&self, handle: PortHandle, on: bool) -> PortResult<()> {
        self.with_state(handle, |state| Ok(state.port.write_request_to_send(on)?))
    }

    fn set_dtr(&self, handle: PortHandle, on: bool) -> PortResult<()> {
        self.with_state(handle, |state| {
            Ok(state.port.write_data_terminal_ready(on)?)
        })
    }

    fn read(&self, handle: PortHandle, count: usize) -> PortResult<Vec<u8>> {
        self.with_state(handle, |state| {
            let available = state.port.bytes_to_read()? as usize;
            let mut buffer = vec![0u8; count.min(available)];
            let mut filled = 0;

            while filled < buffer.len() {
                match state.port.read(&mut buffer[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                    Err(e) => return Err(PortError::Io(e)),
                }
            }

            buffer.truncate(filled);
            Ok(buffer)
        })
    }

    fn write(&self, handle: PortHandle, data: &[u8]) -> PortResult<()> {
        self.with_state(handle, |state| {
            state.port.write_all(data)?;
            state.port.flush()?;
            Ok(())
        })
    }

    fn buffer_counts(&self, handle: PortHandle) -> PortResult<BufferCounts> {
        self.with_state(handle, |state| {
            Ok(BufferCounts {
                input: state.port.bytes_to_read()? as usize,
                output: state.port.bytes_to_write()? as usize,
            })
        })
    }

    fn set_flow_control_mode(&self, handle: PortHandle, mask: u32) -> PortResult<()> {
        self.with_state(handle, |state| {
            state.port.set_flow_control(flow_control_for(mask))?;
            state.flow_control = mask;
            Ok(())
        })
    }

    fn flow_control_mode(&self, handle: PortHandle) -> PortResult<u32> {
        self.with_state(handle, |state| Ok(state.flow_control))
    }

    fn list_port_names(&self) -> PortResult<Vec<String>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|info| info.port_name).collect())
    }

    fn lines_status(&self, handle: PortHandle) -> PortResult<LineStatus> {
        self.with_state(handle, |state| read_lines(state.port.as_mut()))
    }

    fn send_break(&self, handle: PortHandle, duration_ms: u32) -> PortResult<()> {
        self.with_state(handle, |state| {
            state.port.set_break()?;
            std::thread::sleep(Duration::from_millis(u64::from(duration_ms)));
            state.port.clear_break()?;
            Ok(())
        })
    }

    fn set_params(&self, handle: PortHandle, params: &PortParams) -> PortResult<()> {
        self.with_state(handle, |state| {
            // nothing reaches the device unless every value converts
            let bits = data_bits(params.data_bits)?;
            let parity = serialport::Parity::try_from(params.parity)?;
            let stop_bits = serialport::StopBits::try_from(params.stop_bits)?;

            state.port.set_baud_rate(params.baud_rate)?;
            state.port.set_data_bits(bits)?;
            state.port.set_parity(parity)?;
            state.port.set_stop_bits(stop_bits)?;
            state.port.write_request_to_send(params.rts)?;
            state.port.write_data_terminal_ready(params.dtr)?;
            Ok(())
        })?;

        debug!(
            "Serial port {} configured: {} baud, {}{}{}",
            handle,
            params.baud_rate,
            params.data_bits,
            match params.parity {
                Parity::None => 'N',
                Parity::Odd => 'O',
                _ => 'E',
            },
            params.stop_bits.code()
        );
        Ok(())
    }

    fn set_events_mask(&self, handle: PortHandle, mask: u32) -> PortResult<()> {
        self.with_state(handle, |state| {
            state.event_mask = mask;
            Ok(())
        })
    }

    fn events_mask(&self, handle: PortHandle) -> PortResult<u32> {
        self.with_state(handle, |state| Ok(state.event_mask))
    }
}

impl std::fmt::Debug for NativeSerialInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .sessions
            .lock()
            .values()
            .map(|s| s.name.clone())
            .collect();
        f.debug_struct("NativeSerialInterface")
            .field("open_ports", &names)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let port = NativeSerialInterface::new();
        let result = port.open("/dev/nonexistent_port_12345", false);

        match result {
            Err(PortError::PortUnavailable { port, .. }) => {
                assert!(port.contains("nonexistent"));
            }
            other => panic!("Expected PortUnavailable error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_handle_is_invalid() {
        let port = NativeSerialInterface::new();
        let handle = PortHandle::from_raw(42);

        assert!(port.read(handle, 8).unwrap_err().is_invalid_handle());
        assert!(port.write(handle, b"x").unwrap_err().is_invalid_handle());
        assert!(port.close(handle).unwrap_err().is_invalid_handle());
        assert!(port.wait_events(handle).unwrap_err().is_invalid_handle());
        assert!(port.clear_cancel(handle).unwrap_err().is_invalid_handle());
        assert!(port
            .set_params(handle, &PortParams::default())
            .unwrap_err()
            .is_invalid_handle());
    }

    #[test]
    fn test_dead_handle_wins_over_unsupported_params() {
        let port = NativeSerialInterface::new();
        let params = PortParams {
            data_bits: 9,
            parity: Parity::Mark,
            ..Default::default()
        };
        let err = port
            .set_params(PortHandle::from_raw(77), &params)
            .unwrap_err();
        assert!(err.is_invalid_handle());
    }

    #[test]
    fn test_open_error_classification() {
        let err = open_error(
            "/dev/ttyUSB9",
            serialport::Error::new(serialport::ErrorKind::NoDevice, "gone"),
        );
        match err {
            PortError::PortUnavailable { port, reason } => {
                assert_eq!(port, "/dev/ttyUSB9");
                assert_eq!(reason, "no such device");
            }
            other => panic!("Expected PortUnavailable error, got: {:?}", other),
        }

        let err = open_error(
            "COM3",
            serialport::Error::new(
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
                "denied",
            ),
        );
        assert!(err.to_string().contains("permission denied"));

        let err = open_error(
            "COM3",
            serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud"),
        );
        assert!(err.to_string().contains("bad baud"));
    }

    #[test]
    fn test_zero_poll_interval_is_raised() {
        let port = NativeSerialInterface::new().with_poll_interval(Duration::ZERO);
        assert_eq!(port.poll_interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_parity_conversion() {
        assert_eq!(
            serialport::Parity::try_from(Parity::Even).unwrap(),
            serialport::Parity::Even
        );
        assert!(serialport::Parity::try_from(Parity::Mark).is_err());
    }

    #[test]
    fn test_stop_bits_conversion() {
        assert_eq!(
            serialport::StopBits::try_from(StopBits::Two).unwrap(),
            serialport::StopBits::Two
        );
        assert!(serialport::StopBits::try_from(StopBits::OnePointFive).is_err());
    }

    #[test]
    fn test_data_bits_conversion() {
        assert_eq!(data_bits(7).unwrap(), serialport::DataBits::Seven);
        assert!(data_bits(4).is_err());
    }

    #[test]
    fn test_flow_control_mapping() {
        assert_eq!(
            flow_control_for(flow_control::RTSCTS_IN | flow_control::RTSCTS_OUT),
            serialport::FlowControl::Hardware
        );
        assert_eq!(
            flow_control_for(flow_control::XONXOFF_OUT),
            serialport::FlowControl::Software
        );
        assert_eq!(
            flow_control_for(flow_control::NONE),
            serialport::FlowControl::None
        );
    }

    #[test]
    fn test_purge_mapping() {
        assert!(matches!(
            clear_buffer_for(purge::RXCLEAR),
            Some(serialport::ClearBuffer::Input)
        ));
        assert!(matches!(
            clear_buffer_for(purge::TXABORT),
            Some(serialport::ClearBuffer::Output)
        ));
        assert!(matches!(
            clear_buffer_for(purge::RXABORT | purge::TXCLEAR),
            Some(serialport::ClearBuffer::All)
        ));
        assert!(clear_buffer_for(0).is_none());
    }

    #[cfg(unix)]
    mod pty {
        use super::*;
        use serialport::{SerialPort, TTYPort};
        use std::sync::Barrier;

        /// A pseudo-terminal pair; the slave side stands in for a device.
        fn device() -> Option<(TTYPort, TTYPort, String)> {
            let Ok((master, mut slave)) = TTYPort::pair() else {
                println!("Skipping: no pseudo-terminal support");
                return None;
            };
            slave.set_exclusive(false).ok()?;
            let name = slave.name()?;
            Some((master, slave, name))
        }

        #[test]
        fn test_concurrent_opens_of_one_device_yield_one_session() {
            let Some((_master, _slave, name)) = device() else {
                return;
            };
            let port = Arc::new(NativeSerialInterface::new());
            let barrier = Arc::new(Barrier::new(8));

            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let port = Arc::clone(&port);
                    let barrier = Arc::clone(&barrier);
                    let name = name.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        port.open(&name, false)
                    })
                })
                .collect();
            let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

            let opened = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(opened, 1);
            assert!(results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, PortError::PortUnavailable { .. })));
        }

        #[test]
        fn test_unsupported_params_on_live_handle() {
            let Some((_master, _slave, name)) = device() else {
                return;
            };
            let port = NativeSerialInterface::new();
            let handle = port.open(&name, false).unwrap();

            let params = PortParams {
                data_bits: 9,
                ..Default::default()
            };
            let err = port.set_params(handle, &params).unwrap_err();
            assert!(matches!(err, PortError::Unsupported(_)));

            // the session survives the rejected call
            port.buffer_counts(handle).unwrap();
            port.close(handle).unwrap();
        }
    }
}
