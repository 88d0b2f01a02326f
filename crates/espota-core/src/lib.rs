//! espota-core: client side of the ESP over-the-air update protocol.
//!
//! Drives a TCP connection to an ESP8266/ESP32-style device from handshake
//! to a confirmed firmware update: magic preamble and version check,
//! optional challenge-response authentication, size and digest
//! announcement, chunked image transfer, and the completion handshake.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: constants, frame encoders, response-code classification
//! - **Transport**: byte-stream abstraction (TCP, mock)
//! - **Events**: observer pattern for UI decoupling
//! - **Payload**: firmware image loading, digesting and chunking
//! - **Session**: the sequential state machine orchestrating one update
//!
//! # Example
//!
//! ```no_run
//! use espota_core::session::{OtaSession, SessionConfig};
//!
//! let config = SessionConfig {
//!     host: "192.168.4.1".to_string(),
//!     image_path: "firmware.bin".to_string(),
//!     ..Default::default()
//! };
//!
//! let session = OtaSession::new(config);
//! session.run().expect("OTA failed");
//! ```

pub mod auth;
pub mod error;
pub mod events;
pub mod payload;
pub mod progress;
pub mod protocol;
pub mod resolve;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::OtaError;
pub use events::{NullObserver, OtaEvent, OtaObserver, OtaPhase, TracingObserver};
pub use payload::{FirmwareError, FirmwareImage};
pub use progress::ProgressThrottle;
pub use protocol::{DeviceFault, ResponseError};
pub use resolve::{ResolveError, resolve_host};
pub use session::{OtaSession, SessionConfig};
pub use transport::{MockTransport, OtaTransport, TcpTransport, TransportError};
