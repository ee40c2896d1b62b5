//! Utility functions for hardware testing.

use serial_iface::port::{PortParams, SerialInterface};
use std::env;
use std::time::{Duration, Instant};

/// Test port configuration from environment.
pub struct TestPortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub loopback_enabled: bool,
}

impl TestPortConfig {
    /// Get test configuration from environment variables.
    ///
    /// Returns `None` (and the caller skips) when `TEST_PORT` is not set.
    pub fn from_env() -> Option<Self> {
        let Ok(port_name) = env::var("TEST_PORT") else {
            println!("Skipping hardware test: TEST_PORT not set");
            return None;
        };
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600);
        let loopback_enabled = env::var("TEST_LOOPBACK").ok().as_deref() == Some("1");

        Some(TestPortConfig {
            port_name,
            baud_rate,
            loopback_enabled,
        })
    }

    /// Line parameters for the test port.
    pub fn params(&self) -> PortParams {
        PortParams {
            baud_rate: self.baud_rate,
            ..Default::default()
        }
    }
}

/// Poll `read` until `expected_len` bytes arrive or `timeout` elapses.
pub fn read_exactly(
    port: &dyn SerialInterface,
    handle: serial_iface::PortHandle,
    expected_len: usize,
    timeout: Duration,
) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    let mut received = Vec::new();
    while received.len() < expected_len && Instant::now() < deadline {
        let chunk = port
            .read(handle, expected_len - received.len())
            .expect("read from hardware port");
        if chunk.is_empty() {
            std::thread::sleep(Duration::from_millis(10));
        }
        received.extend(chunk);
    }
    received
}
