//! Tests requiring actual serial hardware.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0          # or COM3 on Windows
//! export TEST_BAUD=9600                  # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if port has TX-RX loopback
//!
//! cargo test -- --ignored
//! ```

use super::utils::{read_exactly, TestPortConfig};
use serial_iface::port::{
    purge, select, BackendKind, EventKind, PortError, SerialInterface, SerialInterfaceExt,
};
use std::sync::Arc;
use std::time::Duration;

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_configure_close() {
    let Some(test) = TestPortConfig::from_env() else {
        return;
    };

    let port = select(BackendKind::Native);
    let handle = port
        .open_configured(&test.port_name, true, &test.params())
        .expect("open hardware port");

    port.purge(handle, purge::RXCLEAR | purge::TXCLEAR).unwrap();
    let counts = port.buffer_counts(handle).unwrap();
    println!("Buffers after purge: {:?}", counts);
    println!("Lines: {:?}", port.lines_status(handle).unwrap());

    port.close(handle).unwrap();
    assert!(port.read(handle, 1).unwrap_err().is_invalid_handle());
}

#[test]
#[ignore]
fn test_real_port_listed() {
    let Some(test) = TestPortConfig::from_env() else {
        return;
    };

    let names = select(BackendKind::Native).list_port_names().unwrap();
    println!("Available ports: {:?}", names);
    assert!(names.iter().any(|name| name == &test.port_name));
}

#[test]
#[ignore]
fn test_real_port_double_open_rejected() {
    let Some(test) = TestPortConfig::from_env() else {
        return;
    };

    let port = select(BackendKind::Native);
    let handle = port.open(&test.port_name, true).unwrap();
    let err = port.open(&test.port_name, true).unwrap_err();
    assert!(matches!(err, PortError::PortUnavailable { .. }));
    port.close(handle).unwrap();
}

#[test]
#[ignore]
fn test_real_port_loopback_wakes_wait() {
    let Some(test) = TestPortConfig::from_env() else {
        return;
    };
    if !test.loopback_enabled {
        println!("Skipping loopback test: TEST_LOOPBACK not set");
        return;
    }

    let port: Arc<dyn SerialInterface> = Arc::from(select(BackendKind::Native));
    let handle = port
        .open_configured(&test.port_name, true, &test.params())
        .unwrap();
    port.purge(handle, purge::RXCLEAR | purge::TXCLEAR).unwrap();

    port.write(handle, b"LOOPBACK").unwrap();
    let events = port.wait_events(handle).unwrap();
    assert!(events.iter().any(|e| e.kind == EventKind::RxChar));

    let echoed = read_exactly(port.as_ref(), handle, 8, Duration::from_secs(2));
    assert_eq!(echoed, b"LOOPBACK");
    port.close(handle).unwrap();
}

#[test]
#[ignore]
fn test_real_port_close_releases_wait() {
    let Some(test) = TestPortConfig::from_env() else {
        return;
    };

    let port: Arc<dyn SerialInterface> = Arc::from(select(BackendKind::Native));
    let handle = port.open(&test.port_name, true).unwrap();
    port.set_events_mask(handle, serial_iface::port::events::RXCHAR)
        .unwrap();

    let waiter = {
        let port = Arc::clone(&port);
        std::thread::spawn(move || port.wait_events(handle))
    };
    std::thread::sleep(Duration::from_millis(300));
    port.close(handle).unwrap();

    let result = waiter.join().unwrap();
    assert!(result.is_err());
}
