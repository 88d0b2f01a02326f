//! OTA session - drives one TCP connection from handshake to completion.
//!
//! The protocol is strictly synchronous: every controller action is followed
//! by a full read of the expected response before the next action. Any error
//! at any step is terminal for the session.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::auth;
use crate::error::OtaError;
use crate::events::{OtaEvent, OtaObserver, OtaPhase, TracingObserver};
use crate::payload::FirmwareImage;
use crate::protocol::constants::*;
use crate::protocol::frame;
use crate::protocol::response::{self, DeviceFault, ResponseError};
use crate::resolve::resolve_host;
use crate::transport::{OtaTransport, TcpTransport};

/// Configuration for an OTA session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Target host: an IP literal or a resolvable name.
    pub host: String,
    /// TCP port the device listens on.
    pub port: u16,
    /// Password for challenge-response auth, if the device demands one.
    pub password: Option<String>,
    /// Path to the firmware binary.
    pub image_path: String,
    /// Transfer chunk size in bytes.
    pub chunk_size: usize,
    /// Connect and handshake timeout in seconds.
    pub handshake_timeout_secs: u64,
    /// Read timeout during bulk transfer, while the device writes flash.
    pub transfer_timeout_secs: u64,
    /// Pause after a successful update before the device should be
    /// considered reachable again.
    pub cooldown_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            password: None,
            image_path: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            handshake_timeout_secs: 10,
            transfer_timeout_secs: 20,
            cooldown_secs: 1,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// OTA session - a sequential state machine over one transport.
pub struct OtaSession<O: OtaObserver> {
    config: SessionConfig,
    observer: Arc<O>,
}

impl OtaSession<TracingObserver> {
    /// Create a session with the default tracing observer.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver::default()))
    }
}

impl<O: OtaObserver + 'static> OtaSession<O> {
    /// Create a session with a custom observer.
    pub fn with_observer(config: SessionConfig, observer: Arc<O>) -> Self {
        Self { config, observer }
    }

    /// Run the complete session: load the image, resolve, connect, upload,
    /// confirm. The transport is closed on every exit path.
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<()> {
        let image = FirmwareImage::load(&self.config.image_path)
            .with_context(|| format!("loading firmware image '{}'", self.config.image_path))?;
        info!(
            file = %self.config.image_path,
            size = image.len(),
            "Uploading firmware"
        );

        let addr = resolve_host(&self.config.host, self.config.port)?;
        let timeout = Duration::from_secs(self.config.handshake_timeout_secs);
        let transport = TcpTransport::connect(addr, timeout)
            .with_context(|| format!("connecting to {}:{}", self.config.host, self.config.port))?;

        let result = self.perform_update(&transport, &image);
        transport.close();
        result?;

        // Give the device a moment to apply the update and reboot before
        // anyone reconnects, e.g. to tail logs.
        thread::sleep(Duration::from_secs(self.config.cooldown_secs));
        Ok(())
    }

    /// Drive the update protocol over an established transport.
    ///
    /// Generic over the transport so the wire conversation can be exercised
    /// against a scripted mock. Teardown is left to the caller, except for a
    /// magic rejection, which closes the transport on the spot.
    pub fn perform_update<T: OtaTransport>(
        &self,
        transport: &T,
        image: &FirmwareImage,
    ) -> crate::error::Result<()> {
        // Phase 1 runs with send coalescing off.
        transport.set_low_latency(true)?;
        self.send(transport, &MAGIC_BYTES, "magic bytes")?;

        let (_, payload) = self.expect(transport, &[RESPONSE_OK], 1, "version")?;
        let version = payload[0];
        if version != OTA_VERSION_1_0 {
            return Err(OtaError::UnsupportedVersion(version));
        }
        debug!(version, "Version accepted");

        self.send(transport, &[FEATURE_MASK_NONE], "features")?;
        self.expect(transport, &[RESPONSE_HEADER_OK], 0, "features")?;

        self.phase(OtaPhase::Handshake, OtaPhase::Authentication);
        let (auth_code, _) = self.expect(
            transport,
            &[RESPONSE_REQUEST_AUTH, RESPONSE_AUTH_OK],
            0,
            "auth",
        )?;
        if auth_code == RESPONSE_REQUEST_AUTH {
            self.authenticate(transport)?;
        }

        self.phase(OtaPhase::Authentication, OtaPhase::Prepare);
        self.send(transport, &frame::encode_length(image.size()), "binary size")?;
        self.expect(transport, &[RESPONSE_UPDATE_PREPARE_OK], 0, "binary size")?;

        self.send(transport, frame::digest_bytes(image.digest()), "file checksum")?;
        self.expect(transport, &[RESPONSE_BIN_MD5_OK], 0, "file checksum")?;

        self.phase(OtaPhase::Prepare, OtaPhase::Transfer);
        self.transfer(transport, image)?;

        self.phase(OtaPhase::Transfer, OtaPhase::Finalize);
        transport.set_low_latency(true)?;
        info!("Waiting for result...");
        self.expect(transport, &[RESPONSE_RECEIVE_OK], 0, "receive OK")?;
        self.expect(transport, &[RESPONSE_UPDATE_END_OK], 0, "update end")?;
        // Fire and forget: the device sends nothing back for this one.
        self.send(
            transport,
            &frame::encode_status(RESPONSE_OK),
            "end acknowledgement",
        )?;

        self.phase(OtaPhase::Finalize, OtaPhase::Complete);
        self.observer.on_event(&OtaEvent::Complete);
        info!("OTA successful");
        Ok(())
    }

    fn authenticate<T: OtaTransport>(&self, transport: &T) -> crate::error::Result<()> {
        let Some(password) = self.config.password.as_deref().filter(|p| !p.is_empty()) else {
            return Err(OtaError::PasswordRequired);
        };

        // The nonce arrives raw, with no status byte in front of it.
        let raw = transport
            .recv_exact(NONCE_LEN)
            .map_err(|e| OtaError::Receive {
                what: "authentication nonce",
                source: e,
            })?;
        let nonce = String::from_utf8(raw).map_err(|_| OtaError::MalformedNonce)?;
        debug!(nonce = %nonce, "Auth: nonce");

        let cnonce = auth::client_nonce();
        debug!(cnonce = %cnonce, "Auth: cnonce");
        self.send(transport, cnonce.as_bytes(), "auth cnonce")?;

        let result = auth::auth_response(password, &nonce, &cnonce);
        debug!(result = %result, "Auth: result");
        self.send(transport, result.as_bytes(), "auth result")?;
        self.expect(transport, &[RESPONSE_AUTH_OK], 0, "auth result")?;
        Ok(())
    }

    fn transfer<T: OtaTransport>(
        &self,
        transport: &T,
        image: &FirmwareImage,
    ) -> crate::error::Result<()> {
        // Bulk mode: coalescing back on, bounded send window so progress
        // tracks what actually went out, and a longer timeout while the
        // device writes flash.
        transport.set_low_latency(false)?;
        transport.limit_send_buffer(TRANSFER_SNDBUF)?;
        transport.set_read_timeout(Duration::from_secs(self.config.transfer_timeout_secs))?;

        let total = image.len() as u64;
        let mut sent: u64 = 0;
        for chunk in image.chunks(self.config.chunk_size) {
            transport.send_all(chunk).map_err(|e| OtaError::Send {
                what: "data",
                source: e,
            })?;
            sent += chunk.len() as u64;
            self.observer.on_event(&OtaEvent::Progress { sent, total });
        }
        debug!(sent, "Transfer complete");
        Ok(())
    }

    fn phase(&self, from: OtaPhase, to: OtaPhase) {
        self.observer.on_event(&OtaEvent::PhaseChanged { from, to });
    }

    fn send<T: OtaTransport>(
        &self,
        transport: &T,
        data: &[u8],
        what: &'static str,
    ) -> crate::error::Result<()> {
        transport
            .send_all(data)
            .map_err(|e| OtaError::Send { what, source: e })
    }

    /// Receive a status byte, classify it, then read `extra` payload bytes.
    ///
    /// The status byte is validated before any payload is read. A magic
    /// rejection tears the transport down on the spot; every other failure
    /// leaves teardown to the caller.
    fn expect<T: OtaTransport>(
        &self,
        transport: &T,
        accepted: &[u8],
        extra: usize,
        what: &'static str,
    ) -> crate::error::Result<(u8, Vec<u8>)> {
        let head = transport.recv_exact(1).map_err(|e| OtaError::Receive {
            what,
            source: e,
        })?;
        let code = match response::classify(head[0], accepted) {
            Ok(code) => code,
            Err(ResponseError::Fault(fault)) => {
                if fault == DeviceFault::Magic {
                    transport.close();
                }
                return Err(OtaError::Device { what, fault });
            }
            Err(ResponseError::Unexpected(code)) => {
                return Err(OtaError::Unexpected { what, code });
            }
        };
        let payload = if extra > 0 {
            transport.recv_exact(extra).map_err(|e| OtaError::Receive {
                what,
                source: e,
            })?
        } else {
            Vec::new()
        };
        Ok((code, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullObserver;
    use crate::transport::MockTransport;

    fn config(password: Option<&str>) -> SessionConfig {
        SessionConfig {
            host: "192.168.4.1".into(),
            password: password.map(str::to_string),
            ..Default::default()
        }
    }

    fn session(password: Option<&str>) -> OtaSession<NullObserver> {
        OtaSession::with_observer(config(password), Arc::new(NullObserver))
    }

    fn image(len: usize) -> FirmwareImage {
        FirmwareImage::from_bytes(vec![0xAB; len]).unwrap()
    }

    fn queue_handshake(mock: &MockTransport) {
        mock.queue_response(&[RESPONSE_OK, OTA_VERSION_1_0]);
        mock.queue_response(&[RESPONSE_HEADER_OK]);
        mock.queue_response(&[RESPONSE_AUTH_OK]);
    }

    fn queue_tail(mock: &MockTransport) {
        mock.queue_response(&[RESPONSE_UPDATE_PREPARE_OK]);
        mock.queue_response(&[RESPONSE_BIN_MD5_OK]);
        mock.queue_response(&[RESPONSE_RECEIVE_OK]);
        mock.queue_response(&[RESPONSE_UPDATE_END_OK]);
    }

    #[test]
    fn full_update_without_auth() {
        let mock = MockTransport::new();
        queue_handshake(&mock);
        queue_tail(&mock);

        let img = image(2500);
        session(None).perform_update(&mock, &img).unwrap();

        let writes = mock.writes();
        assert_eq!(writes[0], MAGIC_BYTES.to_vec());
        assert_eq!(writes[1], vec![FEATURE_MASK_NONE]);
        assert_eq!(writes[2], vec![0x00, 0x00, 0x09, 0xC4]); // 2500, MSB first
        assert_eq!(writes[3], img.digest().as_bytes().to_vec());
        // ceil(2500/1024) data chunks, then the final acknowledgement byte.
        assert_eq!(writes.len(), 4 + 3 + 1);
        let data_sent: usize = writes[4..7].iter().map(Vec::len).sum();
        assert_eq!(data_sent, 2500);
        assert_eq!(writes[7], vec![RESPONSE_OK]);
    }

    #[test]
    fn transfer_switches_socket_modes() {
        let mock = MockTransport::new();
        queue_handshake(&mock);
        queue_tail(&mock);

        let img = image(100);
        session(None).perform_update(&mock, &img).unwrap();

        // Low latency for the handshake, buffered for transfer, low latency
        // again for the completion exchange.
        assert_eq!(mock.low_latency_changes(), vec![true, false, true]);
        assert_eq!(mock.send_buffer_changes(), vec![TRANSFER_SNDBUF]);
        assert_eq!(
            mock.read_timeout_changes(),
            vec![Duration::from_secs(20)]
        );
    }

    #[test]
    fn version_mismatch_aborts_before_features() {
        let mock = MockTransport::new();
        mock.queue_response(&[RESPONSE_OK, 2]);

        let img = image(16);
        let err = session(None).perform_update(&mock, &img).unwrap_err();
        assert!(matches!(err, OtaError::UnsupportedVersion(2)));
        // Only the magic preamble went out.
        assert_eq!(mock.writes().len(), 1);
    }

    #[test]
    fn auth_request_without_password_sends_nothing_more() {
        let mock = MockTransport::new();
        mock.queue_response(&[RESPONSE_OK, OTA_VERSION_1_0]);
        mock.queue_response(&[RESPONSE_HEADER_OK]);
        mock.queue_response(&[RESPONSE_REQUEST_AUTH]);

        let img = image(16);
        let err = session(None).perform_update(&mock, &img).unwrap_err();
        assert!(matches!(err, OtaError::PasswordRequired));
        assert_eq!(mock.writes().len(), 2); // magic + features only
    }

    #[test]
    fn empty_password_counts_as_missing() {
        let mock = MockTransport::new();
        mock.queue_response(&[RESPONSE_OK, OTA_VERSION_1_0]);
        mock.queue_response(&[RESPONSE_HEADER_OK]);
        mock.queue_response(&[RESPONSE_REQUEST_AUTH]);

        let img = image(16);
        let err = session(Some("")).perform_update(&mock, &img).unwrap_err();
        assert!(matches!(err, OtaError::PasswordRequired));
    }

    #[test]
    fn auth_flow_sends_a_valid_proof() {
        let mock = MockTransport::new();
        mock.queue_response(&[RESPONSE_OK, OTA_VERSION_1_0]);
        mock.queue_response(&[RESPONSE_HEADER_OK]);
        mock.queue_response(&[RESPONSE_REQUEST_AUTH]);
        let nonce = "0123456789abcdef0123456789abcdef";
        mock.queue_response(nonce.as_bytes());
        mock.queue_response(&[RESPONSE_AUTH_OK]);
        queue_tail(&mock);

        let img = image(64);
        session(Some("hunter2")).perform_update(&mock, &img).unwrap();

        let writes = mock.writes();
        let cnonce = String::from_utf8(writes[2].clone()).unwrap();
        assert_eq!(cnonce.len(), NONCE_LEN);
        let proof = String::from_utf8(writes[3].clone()).unwrap();
        assert_eq!(proof, auth::auth_response("hunter2", nonce, &cnonce));
    }

    #[test]
    fn flash_write_fault_during_prepare() {
        let mock = MockTransport::new();
        queue_handshake(&mock);
        mock.queue_response(&[RESPONSE_ERROR_WRITING_FLASH]);

        let img = image(16);
        let err = session(None).perform_update(&mock, &img).unwrap_err();
        match err {
            OtaError::Device { fault, .. } => assert_eq!(fault, DeviceFault::WritingFlash),
            other => panic!("wrong error: {other}"),
        }
        assert!(!mock.is_closed()); // teardown is the caller's job here
    }

    #[test]
    fn magic_rejection_closes_the_transport() {
        let mock = MockTransport::new();
        mock.queue_response(&[RESPONSE_ERROR_MAGIC]);

        let img = image(16);
        let err = session(None).perform_update(&mock, &img).unwrap_err();
        assert!(matches!(
            err,
            OtaError::Device {
                fault: DeviceFault::Magic,
                ..
            }
        ));
        assert!(mock.is_closed());
    }

    #[test]
    fn unexpected_byte_is_reported_verbatim() {
        let mock = MockTransport::new();
        mock.queue_response(&[42]);

        let img = image(16);
        let err = session(None).perform_update(&mock, &img).unwrap_err();
        assert!(matches!(err, OtaError::Unexpected { code: 42, .. }));
    }

    #[test]
    fn send_failure_during_transfer_is_a_send_error() {
        let mock = MockTransport::new();
        queue_handshake(&mock);
        queue_tail(&mock);
        // magic, features, size, digest succeed; the first data chunk fails.
        mock.fail_sends_after(4);

        let img = image(4096);
        let err = session(None).perform_update(&mock, &img).unwrap_err();
        assert!(matches!(err, OtaError::Send { what: "data", .. }));
    }

    struct RecordingObserver(std::sync::Mutex<Vec<OtaEvent>>);

    impl OtaObserver for RecordingObserver {
        fn on_event(&self, event: &OtaEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn progress_reaches_the_image_total() {
        let mock = MockTransport::new();
        queue_handshake(&mock);
        queue_tail(&mock);

        let observer = Arc::new(RecordingObserver(std::sync::Mutex::new(Vec::new())));
        let session = OtaSession::with_observer(config(None), observer.clone());
        let img = image(2500);
        session.perform_update(&mock, &img).unwrap();

        let events = observer.0.lock().unwrap();
        let progress: Vec<(u64, u64)> = events
            .iter()
            .filter_map(|e| match e {
                OtaEvent::Progress { sent, total } => Some((*sent, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 3); // one update per chunk
        assert!(progress.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(progress.last(), Some(&(2500, 2500)));
        assert!(matches!(events.last(), Some(OtaEvent::Complete)));
    }

    #[test]
    fn config_file_roundtrip() {
        let cfg = config(Some("pw"));
        let path = std::env::temp_dir().join("espota-session-config-test.toml");
        cfg.save_to_file(&path).unwrap();
        let loaded = SessionConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.host, cfg.host);
        assert_eq!(loaded.port, DEFAULT_PORT);
        assert_eq!(loaded.password.as_deref(), Some("pw"));
        assert_eq!(loaded.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
