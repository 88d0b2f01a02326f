//! Encoders for the controller -> device direction.
//!
//! The wire format is deliberately plain: byte sequences go out verbatim,
//! hex digests travel as the ASCII bytes of their lowercase text, status
//! codes are single bytes, and the one multi-byte integer (the image length)
//! is four bytes, most-significant first. Each payload kind has its own
//! encoder; the call site picks the right one.

use byteorder::{BigEndian, WriteBytesExt};

/// Encode the 32-bit image length as four bytes, most-significant first.
pub fn encode_length(len: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4);
    buf.write_u32::<BigEndian>(len).unwrap();
    buf
}

/// Encode a single status code.
pub fn encode_status(code: u8) -> [u8; 1] {
    [code]
}

/// A hex digest is transmitted as the ASCII bytes of its text form, never
/// as the raw digest bytes.
pub fn digest_bytes(digest: &str) -> &[u8] {
    digest.as_bytes()
}
