//! Random login nonces and generated handles.

use rand::rngs::OsRng;
use rand::RngCore;

/// `len` random bytes, hex-encoded.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A login challenge nonce: 16 random bytes as 32 hex chars.
pub fn random_nonce() -> String {
    random_hex(16)
}

/// A generated handle for lazily-created identities, e.g. `user_3f9c21ab04d7`.
pub fn random_handle() -> String {
    format!("user_{}", random_hex(6))
}
