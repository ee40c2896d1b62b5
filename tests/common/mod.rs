//! Shared test utilities for serial-iface integration tests.
//!
//! - Virtual backend construction with a fixed terminator
//! - Helpers for running a blocking `wait_events` on another thread
//! - Expected-stream builders for the loopback framing

#![allow(dead_code)]

use serial_iface::port::{
    EventRecord, PortHandle, PortResult, SerialInterface, VirtualSerialInterface,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Terminator used by every virtual port built here.
pub const TERMINATOR: &[u8] = b"\n";

/// Upper bound for anything that is supposed to happen "promptly".
pub const PROMPT: Duration = Duration::from_secs(3);

/// Create a virtual backend with a deterministic terminator.
pub fn virtual_port() -> VirtualSerialInterface {
    VirtualSerialInterface::new().with_terminator(TERMINATOR)
}

/// Create a shared virtual backend and open `name` on it.
pub fn shared_virtual_port(name: &str) -> (Arc<VirtualSerialInterface>, PortHandle) {
    let port = Arc::new(virtual_port());
    let handle = port.open(name, false).expect("open virtual port");
    (port, handle)
}

/// Open `name` and consume the initial configuration event.
pub fn open_past_configuration(port: &dyn SerialInterface, name: &str) -> PortHandle {
    let handle = port.open(name, false).expect("open virtual port");
    port.wait_events(handle).expect("configuration event");
    handle
}

/// Run `wait_events` on a background thread; the receiver yields its result.
pub fn spawn_wait<P>(port: Arc<P>, handle: PortHandle) -> mpsc::Receiver<PortResult<Vec<EventRecord>>>
where
    P: SerialInterface + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(port.wait_events(handle));
    });
    rx
}

/// Concatenate payloads the way the loopback stream frames them.
pub fn framed(payloads: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for payload in payloads {
        out.extend_from_slice(payload);
        out.extend_from_slice(TERMINATOR);
    }
    out
}
