//! Session events for UI decoupling.
//!
//! Front ends (progress bars, logs) subscribe to protocol events without
//! tight coupling to the session logic. Diagnostics flow through an
//! injected observer rather than any ambient state.

use std::fmt;
use std::sync::Mutex;

use crate::progress::ProgressThrottle;

/// Update phases, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaPhase {
    /// Magic preamble, version check and feature negotiation.
    Handshake,
    /// Challenge-response authentication.
    Authentication,
    /// Size and digest announcement.
    Prepare,
    /// Bulk image transfer.
    Transfer,
    /// Completion handshake and final acknowledgement.
    Finalize,
    /// Update applied.
    Complete,
}

impl fmt::Display for OtaPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtaPhase::Handshake => write!(f, "Handshake"),
            OtaPhase::Authentication => write!(f, "Authentication"),
            OtaPhase::Prepare => write!(f, "Prepare"),
            OtaPhase::Transfer => write!(f, "Transfer"),
            OtaPhase::Finalize => write!(f, "Finalize"),
            OtaPhase::Complete => write!(f, "Complete"),
        }
    }
}

/// Events emitted by an OTA session.
#[derive(Debug, Clone)]
pub enum OtaEvent {
    /// Phase changed.
    PhaseChanged { from: OtaPhase, to: OtaPhase },
    /// Bytes transferred so far, out of the image total.
    Progress { sent: u64, total: u64 },
    /// Update finished successfully.
    Complete,
}

/// Observer trait for receiving session events.
///
/// Implement this in the UI layer to receive updates.
pub trait OtaObserver: Send + Sync {
    fn on_event(&self, event: &OtaEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl OtaObserver for NullObserver {
    fn on_event(&self, _event: &OtaEvent) {}
}

/// Observer that logs events using tracing, at most one line per integer
/// percent of transfer progress.
#[derive(Default)]
pub struct TracingObserver {
    throttle: Mutex<ProgressThrottle>,
}

impl OtaObserver for TracingObserver {
    fn on_event(&self, event: &OtaEvent) {
        match event {
            OtaEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Phase changed");
            }
            OtaEvent::Progress { sent, total } => {
                let fraction = if *total > 0 {
                    *sent as f64 / *total as f64
                } else {
                    1.0
                };
                if let Some(pct) = self.throttle.lock().unwrap().update(fraction) {
                    tracing::debug!(progress = %format!("{pct}%"), "Uploading");
                }
            }
            OtaEvent::Complete => {
                tracing::info!("OTA successful");
            }
        }
    }
}
