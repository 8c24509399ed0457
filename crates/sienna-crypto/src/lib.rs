//! # sienna-crypto
//!
//! Cryptographic operations for the Sienna backend.
//!
//! ## Modules
//!
//! - [`hash`] — Keccak-256 and EIP-191 personal-message hashing
//! - [`wallet`] — secp256k1 signature parsing and signer recovery
//! - [`token`] — HMAC-SHA256 session tokens (mint and verify)
//! - [`password`] — Argon2id credential hashing
//! - [`nonce`] — random login nonces and generated handles

pub mod hash;
pub mod nonce;
pub mod password;
pub mod token;
pub mod wallet;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Signature bytes are malformed (length, hex, or scalar range).
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// No public key could be recovered for the given signature.
    #[error("signer recovery failed")]
    RecoveryFailed,

    /// Argon2id hashing failed.
    #[error("argon2id error: {0}")]
    Argon2(String),

    /// Token failed MAC verification or could not be parsed.
    #[error("token verification failed")]
    TokenInvalid,

    /// Token was well-formed and authentic but past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
