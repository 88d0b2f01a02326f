//! Challenge-response authentication primitives.
//!
//! The device issues a 32-character nonce; the controller answers with a
//! fresh client nonce and an MD5 proof over (password, device nonce, client
//! nonce). The digest input order is fixed by the device implementation and
//! must match exactly.

use md5::{Digest, Md5};
use rand::RngCore;

/// Generate a fresh 32-character lowercase-hex client nonce.
pub fn client_nonce() -> String {
    let mut seed = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut seed);
    hex::encode(Md5::digest(seed))
}

/// Compute the authentication proof for a challenge: the MD5 digest of the
/// password bytes, the device nonce text and the client nonce text, in that
/// order, as lowercase hex.
pub fn auth_response(password: &str, nonce: &str, cnonce: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(cnonce.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_matches_known_vectors() {
        // MD5("") and MD5("abc")
        assert_eq!(auth_response("", "", ""), "d41d8cd98f59b204e9800998ecf8427e");
        assert_eq!(
            auth_response("a", "b", "c"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn proof_is_deterministic() {
        assert_eq!(
            auth_response("pw", "nonce", "cnonce"),
            auth_response("pw", "nonce", "cnonce")
        );
    }

    #[test]
    fn proof_is_order_sensitive() {
        assert_ne!(
            auth_response("pw", "first", "second"),
            auth_response("pw", "second", "first")
        );
    }

    #[test]
    fn client_nonce_is_lowercase_hex_and_fresh() {
        let a = client_nonce();
        let b = client_nonce();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        assert_ne!(a, b);
    }
}
