//! Transport implementations for raw-REPL device control.
//!
//! Provides:
//! - `SerialTransport` - Serial device at a configurable baud rate
//! - `TcpTransport` - Network socket with telnet-style login
//! - `ScriptedTransport` - In-memory scripted transport for protocol tests
//! - `DeviceAddr` - Address-syntax dispatch between the two real transports

pub mod addr;
pub mod scripted;
pub mod serial;
pub mod tcp;

pub use addr::DeviceAddr;
pub use scripted::{ScriptedTransport, WriteLog};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

/// Index one past the first occurrence of `marker` in `buf`, if any.
pub(crate) fn find_marker(buf: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || buf.len() < marker.len() {
        return None;
    }
    buf.windows(marker.len())
        .position(|w| w == marker)
        .map(|start| start + marker.len())
}
