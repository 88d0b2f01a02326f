//! Response-code classification.
//!
//! Every exchange begins with a single status byte from the device. Error
//! codes always win: they classify to a [`DeviceFault`] regardless of what
//! the call site expected. A byte that is neither an error nor a member of
//! the accepted set is an unexpected response carrying the literal value.

use thiserror::Error;

use crate::protocol::constants::*;

/// Failure classes the device can report, one per wire code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    #[error("invalid magic byte")]
    Magic,
    #[error(
        "couldn't prepare flash memory for update. Is the binary too big? \
         Please try restarting the device"
    )]
    UpdatePrepare,
    #[error("authentication invalid. Is the password correct?")]
    AuthInvalid,
    #[error("writing OTA data to flash memory failed. See device logs for more information")]
    WritingFlash,
    #[error("finishing the update failed. See device logs for more information")]
    UpdateEnd,
    #[error(
        "please press the reset button on the device. A manual reset is \
         required on the first OTA update after flashing over USB"
    )]
    InvalidBootstrapping,
    #[error(
        "device has been flashed with the wrong flash size. Please choose the \
         correct board option and flash over USB first"
    )]
    WrongCurrentFlashConfig,
    #[error(
        "device does not have the requested flash size (wrong board). Please \
         choose the correct board option and try uploading again"
    )]
    WrongNewFlashConfig,
    #[error(
        "device does not have enough space to store the OTA file. Please try \
         flashing a minimal firmware first"
    )]
    Esp8266NotEnoughSpace,
    #[error("the OTA partition on the device is too small. Please resize it by flashing over USB")]
    Esp32PartitionTooSmall,
    #[error("unknown error from device")]
    Unknown,
}

impl DeviceFault {
    /// Map a wire code to its fault class, if it is one of the defined errors.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            RESPONSE_ERROR_MAGIC => Some(Self::Magic),
            RESPONSE_ERROR_UPDATE_PREPARE => Some(Self::UpdatePrepare),
            RESPONSE_ERROR_AUTH_INVALID => Some(Self::AuthInvalid),
            RESPONSE_ERROR_WRITING_FLASH => Some(Self::WritingFlash),
            RESPONSE_ERROR_UPDATE_END => Some(Self::UpdateEnd),
            RESPONSE_ERROR_INVALID_BOOTSTRAPPING => Some(Self::InvalidBootstrapping),
            RESPONSE_ERROR_WRONG_CURRENT_FLASH_CONFIG => Some(Self::WrongCurrentFlashConfig),
            RESPONSE_ERROR_WRONG_NEW_FLASH_CONFIG => Some(Self::WrongNewFlashConfig),
            RESPONSE_ERROR_ESP8266_NOT_ENOUGH_SPACE => Some(Self::Esp8266NotEnoughSpace),
            RESPONSE_ERROR_ESP32_NOT_ENOUGH_SPACE => Some(Self::Esp32PartitionTooSmall),
            RESPONSE_ERROR_UNKNOWN => Some(Self::Unknown),
            _ => None,
        }
    }

    /// The wire code for this fault.
    pub fn code(&self) -> u8 {
        match self {
            Self::Magic => RESPONSE_ERROR_MAGIC,
            Self::UpdatePrepare => RESPONSE_ERROR_UPDATE_PREPARE,
            Self::AuthInvalid => RESPONSE_ERROR_AUTH_INVALID,
            Self::WritingFlash => RESPONSE_ERROR_WRITING_FLASH,
            Self::UpdateEnd => RESPONSE_ERROR_UPDATE_END,
            Self::InvalidBootstrapping => RESPONSE_ERROR_INVALID_BOOTSTRAPPING,
            Self::WrongCurrentFlashConfig => RESPONSE_ERROR_WRONG_CURRENT_FLASH_CONFIG,
            Self::WrongNewFlashConfig => RESPONSE_ERROR_WRONG_NEW_FLASH_CONFIG,
            Self::Esp8266NotEnoughSpace => RESPONSE_ERROR_ESP8266_NOT_ENOUGH_SPACE,
            Self::Esp32PartitionTooSmall => RESPONSE_ERROR_ESP32_NOT_ENOUGH_SPACE,
            Self::Unknown => RESPONSE_ERROR_UNKNOWN,
        }
    }
}

/// Outcome of classifying a status byte against an accepted set.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseError {
    #[error(transparent)]
    Fault(#[from] DeviceFault),

    #[error("unexpected response from device: 0x{0:02X}")]
    Unexpected(u8),
}

/// Classify a status byte against the codes a call site accepts.
///
/// Device faults take priority and never fall through to the unexpected
/// case, even when the fault code happens to be listed as accepted.
pub fn classify(code: u8, accepted: &[u8]) -> Result<u8, ResponseError> {
    if let Some(fault) = DeviceFault::from_code(code) {
        return Err(ResponseError::Fault(fault));
    }
    if accepted.contains(&code) {
        Ok(code)
    } else {
        Err(ResponseError::Unexpected(code))
    }
}
