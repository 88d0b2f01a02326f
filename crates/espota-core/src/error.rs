//! Session-level error type.
//!
//! Every variant is terminal: the session never retries a step, and the
//! caller closes the transport on any exit path.

use thiserror::Error;

use crate::protocol::response::DeviceFault;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum OtaError {
    /// The device answered an exchange with one of its defined error codes.
    #[error("error {what}: {fault}")]
    Device { what: &'static str, fault: DeviceFault },

    /// The device answered with a byte outside the set this exchange accepts.
    #[error("unexpected response while {what}: 0x{code:02X}")]
    Unexpected { what: &'static str, code: u8 },

    #[error("unsupported OTA version {0}")]
    UnsupportedVersion(u8),

    #[error("device requests a password, but no password was given")]
    PasswordRequired,

    #[error("authentication nonce is not valid text")]
    MalformedNonce,

    #[error("error sending {what}: {source}")]
    Send {
        what: &'static str,
        source: TransportError,
    },

    #[error("error receiving {what}: {source}")]
    Receive {
        what: &'static str,
        source: TransportError,
    },

    /// Transport setup failure outside a specific exchange (socket options,
    /// timeout changes).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, OtaError>;
