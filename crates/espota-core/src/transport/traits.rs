//! Byte-stream transport abstraction.
//!
//! Defines the `OtaTransport` trait the session drives, allowing different
//! implementations (TCP, mock).

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connecting to {addr} failed: {message}")]
    ConnectFailed { addr: String, message: String },

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("connection closed by peer")]
    Disconnected,

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reliable ordered byte stream with the socket-level knobs the update
/// protocol needs.
///
/// Short control exchanges run in low-latency mode (send coalescing off);
/// the bulk transfer runs buffered, with a clamped send window and a longer
/// read timeout while the device writes flash.
pub trait OtaTransport: Send {
    /// Write the whole buffer or fail.
    fn send_all(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Read exactly `len` bytes, accumulating partial reads as long as the
    /// connection stays alive.
    fn recv_exact(&self, len: usize) -> Result<Vec<u8>, TransportError>;

    /// Toggle low-latency mode: `true` disables send coalescing for short
    /// control exchanges, `false` restores buffered sends for bulk transfer.
    fn set_low_latency(&self, enabled: bool) -> Result<(), TransportError>;

    /// Replace the read timeout.
    fn set_read_timeout(&self, timeout: Duration) -> Result<(), TransportError>;

    /// Clamp the kernel send buffer so write calls return in bounded chunks.
    fn limit_send_buffer(&self, bytes: usize) -> Result<(), TransportError>;

    /// Tear the connection down. Safe to call more than once.
    fn close(&self);
}
