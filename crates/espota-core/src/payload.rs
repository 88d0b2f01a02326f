//! Firmware image loading, digesting and chunking.

use std::fmt;
use std::path::Path;

use md5::{Digest, Md5};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("firmware image is empty")]
    Empty,

    #[error("firmware image is too large: {actual} bytes")]
    TooLarge { actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A firmware image buffered in memory.
///
/// The content digest is computed once, over the whole image, before any
/// transfer begins; chunked reads start from the beginning of the image and
/// are independent of the digest pass.
pub struct FirmwareImage {
    data: Vec<u8>,
    digest: String,
}

impl FirmwareImage {
    /// Load an image from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FirmwareError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Wrap raw image bytes. The length must fit the 4-byte wire field.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FirmwareError> {
        if data.is_empty() {
            return Err(FirmwareError::Empty);
        }
        if data.len() > u32::MAX as usize {
            return Err(FirmwareError::TooLarge { actual: data.len() });
        }
        let digest = hex::encode(Md5::digest(&data));
        debug!(digest = %digest, size = data.len(), "Computed image digest");
        Ok(Self { data, digest })
    }

    /// Total length, as carried in the length field of the wire protocol.
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whole-image content digest as lowercase hex text.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Sequential fixed-size chunks from the start of the image. The final
    /// chunk carries the remainder.
    pub fn chunks(&self, chunk_size: usize) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(chunk_size)
    }
}

impl fmt::Debug for FirmwareImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirmwareImage")
            .field("size", &self.data.len())
            .field("digest", &self.digest)
            .finish()
    }
}
