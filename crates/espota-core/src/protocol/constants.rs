//! Wire constants for the OTA update protocol.
//!
//! The response-code space is partitioned into three disjoint classes:
//! informational codes (`0`, `1`), per-phase success codes (`64..=69`) and
//! error codes (`128..=137` plus `255`).

/// Magic preamble opening every OTA connection.
pub const MAGIC_BYTES: [u8; 5] = [0x6C, 0x26, 0xF7, 0x5C, 0x45];

/// The single supported protocol version.
pub const OTA_VERSION_1_0: u8 = 1;

/// Feature bitmask sent after the version exchange. No capabilities are
/// negotiated yet, so this is always zero.
pub const FEATURE_MASK_NONE: u8 = 0x00;

/// Default TCP port the device listens on.
pub const DEFAULT_PORT: u16 = 3232;

/// Default transfer chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Length of the authentication nonce, in both directions.
pub const NONCE_LEN: usize = 32;

/// Send-buffer clamp applied during bulk transfer so that each write call
/// completes in a bounded step and progress tracks what actually went out.
pub const TRANSFER_SNDBUF: usize = 8192;

// ============================================================================
// Response codes (device -> controller)
// ============================================================================

/// Generic acknowledgement.
pub const RESPONSE_OK: u8 = 0;
/// Device demands challenge-response authentication.
pub const RESPONSE_REQUEST_AUTH: u8 = 1;

pub const RESPONSE_HEADER_OK: u8 = 64;
pub const RESPONSE_AUTH_OK: u8 = 65;
pub const RESPONSE_UPDATE_PREPARE_OK: u8 = 66;
pub const RESPONSE_BIN_MD5_OK: u8 = 67;
pub const RESPONSE_RECEIVE_OK: u8 = 68;
pub const RESPONSE_UPDATE_END_OK: u8 = 69;

pub const RESPONSE_ERROR_MAGIC: u8 = 128;
pub const RESPONSE_ERROR_UPDATE_PREPARE: u8 = 129;
pub const RESPONSE_ERROR_AUTH_INVALID: u8 = 130;
pub const RESPONSE_ERROR_WRITING_FLASH: u8 = 131;
pub const RESPONSE_ERROR_UPDATE_END: u8 = 132;
pub const RESPONSE_ERROR_INVALID_BOOTSTRAPPING: u8 = 133;
pub const RESPONSE_ERROR_WRONG_CURRENT_FLASH_CONFIG: u8 = 134;
pub const RESPONSE_ERROR_WRONG_NEW_FLASH_CONFIG: u8 = 135;
pub const RESPONSE_ERROR_ESP8266_NOT_ENOUGH_SPACE: u8 = 136;
pub const RESPONSE_ERROR_ESP32_NOT_ENOUGH_SPACE: u8 = 137;
pub const RESPONSE_ERROR_UNKNOWN: u8 = 255;
