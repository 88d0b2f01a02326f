//! TCP transport implementation over `std::net`.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use socket2::SockRef;
use tracing::{debug, info};

use super::traits::{OtaTransport, TransportError};

/// Production transport over a connected `TcpStream`.
pub struct TcpTransport {
    stream: TcpStream,
    read_timeout_ms: AtomicU64,
}

impl TcpTransport {
    /// Connect with a bounded timeout. The same duration becomes the initial
    /// read timeout for the handshake phase.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        info!(%addr, "Connecting");
        let stream =
            TcpStream::connect_timeout(&addr, timeout).map_err(|e| TransportError::ConnectFailed {
                addr: addr.to_string(),
                message: e.to_string(),
            })?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(Self {
            stream,
            read_timeout_ms: AtomicU64::new(timeout.as_millis() as u64),
        })
    }
}

impl OtaTransport for TcpTransport {
    fn send_all(&self, data: &[u8]) -> Result<(), TransportError> {
        (&self.stream)
            .write_all(data)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    fn recv_exact(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match (&self.stream).read(&mut buf[filled..]) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    return Err(TransportError::Timeout {
                        timeout_ms: self.read_timeout_ms.load(Ordering::Relaxed),
                    });
                }
                Err(e) => return Err(TransportError::ReadFailed(e.to_string())),
            }
        }
        Ok(buf)
    }

    fn set_low_latency(&self, enabled: bool) -> Result<(), TransportError> {
        debug!(enabled, "Low-latency mode");
        self.stream.set_nodelay(enabled)?;
        Ok(())
    }

    fn set_read_timeout(&self, timeout: Duration) -> Result<(), TransportError> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.read_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn limit_send_buffer(&self, bytes: usize) -> Result<(), TransportError> {
        debug!(bytes, "Clamping send buffer");
        SockRef::from(&self.stream).set_send_buffer_size(bytes)?;
        Ok(())
    }

    fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn recv_exact_accumulates_partial_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            peer.write_all(b"he").unwrap();
            peer.flush().unwrap();
            thread::sleep(Duration::from_millis(50));
            peer.write_all(b"llo").unwrap();
        });

        let transport = TcpTransport::connect(addr, Duration::from_secs(5)).unwrap();
        transport.set_low_latency(true).unwrap();
        transport.limit_send_buffer(8192).unwrap();
        assert_eq!(transport.recv_exact(5).unwrap(), b"hello");
        server.join().unwrap();
    }

    #[test]
    fn peer_close_reports_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (peer, _) = listener.accept().unwrap();
            drop(peer);
        });

        let transport = TcpTransport::connect(addr, Duration::from_secs(5)).unwrap();
        server.join().unwrap();
        assert!(matches!(
            transport.recv_exact(1),
            Err(TransportError::Disconnected)
        ));
    }

    #[test]
    fn read_timeout_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = TcpTransport::connect(addr, Duration::from_secs(5)).unwrap();
        let (_peer, _) = listener.accept().unwrap();
        transport
            .set_read_timeout(Duration::from_millis(50))
            .unwrap();
        assert!(matches!(
            transport.recv_exact(1),
            Err(TransportError::Timeout { timeout_ms: 50 })
        ));
    }
}
