//! Data model shared by every serial backend.
//!
//! Handles, line parameters, event records and status-line snapshots, plus the
//! numeric mask constants callers pass through the contract unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token identifying one open port session.
///
/// A handle is only meaningful to the backend that issued it, and only between
/// the `open` that produced it and the matching `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortHandle(u64);

impl PortHandle {
    /// Wrap a raw handle value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Purge flags accepted by [`SerialInterface::purge`](super::SerialInterface::purge).
pub mod purge {
    pub const TXABORT: u32 = 0x0001;
    pub const RXABORT: u32 = 0x0002;
    pub const TXCLEAR: u32 = 0x0004;
    pub const RXCLEAR: u32 = 0x0008;

    /// Every bit that touches the receive side.
    pub const RX_ANY: u32 = RXABORT | RXCLEAR;
    /// Every bit that touches the transmit side.
    pub const TX_ANY: u32 = TXABORT | TXCLEAR;
}

/// Flow-control mode bits.
pub mod flow_control {
    pub const NONE: u32 = 0;
    pub const RTSCTS_IN: u32 = 1;
    pub const RTSCTS_OUT: u32 = 2;
    pub const XONXOFF_IN: u32 = 4;
    pub const XONXOFF_OUT: u32 = 8;
}

/// Event mask bits.
pub mod events {
    pub const RXCHAR: u32 = 0x001;
    pub const RXFLAG: u32 = 0x002;
    pub const TXEMPTY: u32 = 0x004;
    pub const CTS: u32 = 0x008;
    pub const DSR: u32 = 0x010;
    pub const RLSD: u32 = 0x020;
    pub const BREAK: u32 = 0x040;
    pub const ERR: u32 = 0x080;
    pub const RING: u32 = 0x100;
}

/// Number of stop bits, carrying the conventional numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
    OnePointFive,
}

impl StopBits {
    /// Numeric code (1, 2, or 3 for one and a half).
    pub fn code(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::OnePointFive => 3,
        }
    }
}

/// Parity mode, carrying the conventional numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// Numeric code (0 = none .. 4 = space).
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Odd => 1,
            Self::Even => 2,
            Self::Mark => 3,
            Self::Space => 4,
        }
    }
}

/// Line parameters applied by `set_params`.
///
/// `data_bits` stays a raw number: ranges are the backend's business, and the
/// virtual backend stores whatever it is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortParams {
    /// Baud rate (bits per second).
    pub baud_rate: u32,
    /// Data bits per character (5..=8 on real hardware).
    pub data_bits: u8,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// Initial RTS level.
    pub rts: bool,
    /// Initial DTR level.
    pub dtr: bool,
    /// Backend-specific extra settings.
    pub flags: u32,
}

impl Default for PortParams {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: StopBits::One,
            parity: Parity::None,
            rts: true,
            dtr: true,
            flags: 0,
        }
    }
}

/// Kind of condition reported by `wait_events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Synthetic "port just became ready" event.
    Configured,
    RxChar,
    RxFlag,
    TxEmpty,
    Cts,
    Dsr,
    Rlsd,
    Break,
    Err,
    Ring,
}

impl EventKind {
    /// Event-mask bit for this kind. `Configured` has no mask bit and reports 0.
    pub fn code(self) -> u32 {
        match self {
            Self::Configured => 0,
            Self::RxChar => events::RXCHAR,
            Self::RxFlag => events::RXFLAG,
            Self::TxEmpty => events::TXEMPTY,
            Self::Cts => events::CTS,
            Self::Dsr => events::DSR,
            Self::Rlsd => events::RLSD,
            Self::Break => events::BREAK,
            Self::Err => events::ERR,
            Self::Ring => events::RING,
        }
    }

    /// Whether `mask` selects this kind. A zero mask selects everything.
    pub fn selected_by(self, mask: u32) -> bool {
        mask == 0 || self == Self::Configured || mask & self.code() != 0
    }
}

/// One `(event type, event value)` pair returned by `wait_events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub value: u32,
}

impl EventRecord {
    pub fn new(kind: EventKind, value: u32) -> Self {
        Self { kind, value }
    }

    /// The numeric `(type, value)` pair.
    pub fn as_pair(&self) -> (u32, u32) {
        (self.kind.code(), self.value)
    }
}

/// Snapshot of the four status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStatus {
    pub cts: bool,
    pub dsr: bool,
    pub ring: bool,
    pub rlsd: bool,
}

impl LineStatus {
    /// Signal levels as integers, ordered CTS, DSR, RING, RLSD.
    pub fn levels(&self) -> [u8; 4] {
        [
            u8::from(self.cts),
            u8::from(self.dsr),
            u8::from(self.ring),
            u8::from(self.rlsd),
        ]
    }

    /// Event records for every line that differs from `previous`.
    pub(crate) fn changes_since(&self, previous: &LineStatus) -> Vec<EventRecord> {
        [
            (EventKind::Cts, self.cts, previous.cts),
            (EventKind::Dsr, self.dsr, previous.dsr),
            (EventKind::Ring, self.ring, previous.ring),
            (EventKind::Rlsd, self.rlsd, previous.rlsd),
        ]
        .into_iter()
        .filter(|(_, now, before)| now != before)
        .map(|(kind, now, _)| EventRecord::new(kind, u32::from(now)))
        .collect()
    }
}

/// Output levels of the two control lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlLines {
    pub rts: bool,
    pub dtr: bool,
}

/// Bytes queued in each direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferCounts {
    pub input: usize,
    pub output: usize,
}
