//! In-memory byte stream used by the virtual backend.
//!
//! Writes are framed with a line terminator and land directly on the readable
//! side, so a single FIFO models "the other end received what we sent".

use std::collections::VecDeque;

/// Platform line separator, used as the default write terminator.
#[cfg(windows)]
pub const DEFAULT_TERMINATOR: &[u8] = b"\r\n";
/// Platform line separator, used as the default write terminator.
#[cfg(not(windows))]
pub const DEFAULT_TERMINATOR: &[u8] = b"\n";

/// FIFO byte stream with terminator framing on write.
#[derive(Debug, Clone)]
pub struct LoopbackBuffer {
    bytes: VecDeque<u8>,
    terminator: Vec<u8>,
}

impl Default for LoopbackBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATOR)
    }
}

impl LoopbackBuffer {
    pub fn new(terminator: &[u8]) -> Self {
        Self {
            bytes: VecDeque::new(),
            terminator: terminator.to_vec(),
        }
    }

    /// Append `data` followed by the terminator.
    pub fn push_framed(&mut self, data: &[u8]) {
        self.bytes.reserve(data.len() + self.terminator.len());
        self.bytes.extend(data);
        self.bytes.extend(&self.terminator);
    }

    /// Remove and return up to `count` bytes from the front.
    pub fn take(&mut self, count: usize) -> Vec<u8> {
        let n = count.min(self.bytes.len());
        self.bytes.drain(..n).collect()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn terminator(&self) -> &[u8] {
        &self.terminator
    }
}
