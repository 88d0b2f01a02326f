//! Scripted transport for state-machine tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::traits::{OtaTransport, TransportError};

/// Mock transport for driving the session without a device.
///
/// Device responses are queued as a flat byte stream; writes are captured
/// per call; socket-option changes are recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    rx_queue: Mutex<VecDeque<u8>>,
    write_log: Mutex<Vec<Vec<u8>>>,
    low_latency_log: Mutex<Vec<bool>>,
    read_timeouts: Mutex<Vec<Duration>>,
    send_buffer_limits: Mutex<Vec<usize>>,
    fail_after_writes: Mutex<Option<usize>>,
    closed: Mutex<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes the device will answer with, in order.
    pub fn queue_response(&self, bytes: &[u8]) {
        self.rx_queue.lock().unwrap().extend(bytes.iter().copied());
    }

    /// All captured writes, one entry per `send_all` call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.write_log.lock().unwrap().clone()
    }

    /// Every low-latency toggle, in order.
    pub fn low_latency_changes(&self) -> Vec<bool> {
        self.low_latency_log.lock().unwrap().clone()
    }

    /// Every read-timeout change, in order.
    pub fn read_timeout_changes(&self) -> Vec<Duration> {
        self.read_timeouts.lock().unwrap().clone()
    }

    /// Every send-buffer clamp, in order.
    pub fn send_buffer_changes(&self) -> Vec<usize> {
        self.send_buffer_limits.lock().unwrap().clone()
    }

    /// Make every `send_all` after the first `n` successful writes fail.
    pub fn fail_sends_after(&self, n: usize) {
        *self.fail_after_writes.lock().unwrap() = Some(n);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl OtaTransport for MockTransport {
    fn send_all(&self, data: &[u8]) -> Result<(), TransportError> {
        if *self.closed.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        let mut log = self.write_log.lock().unwrap();
        if let Some(limit) = *self.fail_after_writes.lock().unwrap()
            && log.len() >= limit
        {
            return Err(TransportError::WriteFailed("injected failure".into()));
        }
        log.push(data.to_vec());
        Ok(())
    }

    fn recv_exact(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        if *self.closed.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        let mut queue = self.rx_queue.lock().unwrap();
        if queue.len() < len {
            return Err(TransportError::Timeout { timeout_ms: 10_000 });
        }
        Ok(queue.drain(..len).collect())
    }

    fn set_low_latency(&self, enabled: bool) -> Result<(), TransportError> {
        self.low_latency_log.lock().unwrap().push(enabled);
        Ok(())
    }

    fn set_read_timeout(&self, timeout: Duration) -> Result<(), TransportError> {
        self.read_timeouts.lock().unwrap().push(timeout);
        Ok(())
    }

    fn limit_send_buffer(&self, bytes: usize) -> Result<(), TransportError> {
        self.send_buffer_limits.lock().unwrap().push(bytes);
        Ok(())
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}
