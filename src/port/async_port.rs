//! Async bridge for the blocking contract.
//!
//! `wait_events` suspends the calling thread, which must never happen on a
//! Tokio worker. `BlockingInterfaceWrapper` moves every call onto the blocking
//! thread pool and adds a timeout-aware wait that cancels the blocked call
//! instead of leaking it.

use super::error::{PortError, PortResult};
use super::traits::SerialInterface;
use super::types::{BufferCounts, EventRecord, LineStatus, PortHandle, PortParams};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Async view of a serial backend.
#[async_trait]
pub trait AsyncSerialInterface: Send + Sync {
    async fn open(&self, port_name: &str, exclusive: bool) -> PortResult<PortHandle>;

    async fn close(&self, handle: PortHandle) -> PortResult<()>;

    async fn set_params(&self, handle: PortHandle, params: PortParams) -> PortResult<()>;

    async fn read(&self, handle: PortHandle, count: usize) -> PortResult<Vec<u8>>;

    async fn write(&self, handle: PortHandle, data: &[u8]) -> PortResult<()>;

    async fn buffer_counts(&self, handle: PortHandle) -> PortResult<BufferCounts>;

    async fn lines_status(&self, handle: PortHandle) -> PortResult<LineStatus>;

    /// Wait for events without blocking the runtime.
    async fn wait_events(&self, handle: PortHandle) -> PortResult<Vec<EventRecord>>;

    /// Like `wait_events`, but gives up after `timeout`.
    ///
    /// On expiry the in-flight wait is cancelled so its blocking thread is
    /// released, and `PortError::Timeout` is returned.
    async fn wait_events_timeout(
        &self,
        handle: PortHandle,
        timeout: Duration,
    ) -> PortResult<Vec<EventRecord>>;
}

/// Runs a synchronous [`SerialInterface`] on `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct BlockingInterfaceWrapper {
    inner: Arc<dyn SerialInterface>,
}

impl BlockingInterfaceWrapper {
    pub fn new(inner: Arc<dyn SerialInterface>) -> Self {
        Self { inner }
    }

    /// The wrapped backend, for synchronous calls that never block.
    pub fn inner(&self) -> &Arc<dyn SerialInterface> {
        &self.inner
    }

    async fn run<T, F>(&self, f: F) -> PortResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SerialInterface) -> PortResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(inner.as_ref()))
            .await
            .map_err(|e| PortError::Io(std::io::Error::other(e)))?
    }
}

impl From<Box<dyn SerialInterface>> for BlockingInterfaceWrapper {
    fn from(inner: Box<dyn SerialInterface>) -> Self {
        Self::new(Arc::from(inner))
    }
}

#[async_trait]
impl AsyncSerialInterface for BlockingInterfaceWrapper {
    async fn open(&self, port_name: &str, exclusive: bool) -> PortResult<PortHandle> {
        let port_name = port_name.to_string();
        self.run(move |port| port.open(&port_name, exclusive)).await
    }

    async fn close(&self, handle: PortHandle) -> PortResult<()> {
        self.run(move |port| port.close(handle)).await
    }

    async fn set_params(&self, handle: PortHandle, params: PortParams) -> PortResult<()> {
        self.run(move |port| port.set_params(handle, &params)).await
    }

    async fn read(&self, handle: PortHandle, count: usize) -> PortResult<Vec<u8>> {
        self.run(move |port| port.read(handle, count)).await
    }

    async fn write(&self, handle: PortHandle, data: &[u8]) -> PortResult<()> {
        let data = data.to_vec();
        self.run(move |port| port.write(handle, &data)).await
    }

    async fn buffer_counts(&self, handle: PortHandle) -> PortResult<BufferCounts> {
        self.run(move |port| port.buffer_counts(handle)).await
    }

    async fn lines_status(&self, handle: PortHandle) -> PortResult<LineStatus> {
        self.run(move |port| port.lines_status(handle)).await
    }

    async fn wait_events(&self, handle: PortHandle) -> PortResult<Vec<EventRecord>> {
        self.run(move |port| port.wait_events(handle)).await
    }

    async fn wait_events_timeout(
        &self,
        handle: PortHandle,
        timeout: Duration,
    ) -> PortResult<Vec<EventRecord>> {
        let inner = Arc::clone(&self.inner);
        let mut task = tokio::task::spawn_blocking(move || inner.wait_events(handle));

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => joined.map_err(|e| PortError::Io(std::io::Error::other(e)))?,
            Err(_) => {
                debug!("Wait on {} timed out after {:?}", handle, timeout);
                let cancelled = !task.is_finished();
                if cancelled {
                    // a close racing the timeout releases the wait on its own
                    if let Err(e) = self.inner.cancel_wait(handle) {
                        debug!("Cancelling wait on {} failed: {}", handle, e);
                    }
                }
                // Drain the released wait. Events that raced with the timeout
                // are still reported rather than dropped.
                match task.await {
                    Ok(Ok(events)) => {
                        if cancelled {
                            // the wait finished before seeing the cancel
                            if let Err(e) = self.inner.clear_cancel(handle) {
                                debug!("Clearing cancel on {} failed: {}", handle, e);
                            }
                        }
                        Ok(events)
                    }
                    Ok(Err(PortError::Interrupted)) => Err(PortError::Timeout(timeout)),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(PortError::Io(std::io::Error::other(e))),
                }
            }
        }
    }
}
