//! # sienna-auth
//!
//! Authentication flows over the identity store:
//!
//! - [`challenge`] — wallet challenge-response login (nonce issue + verify)
//! - [`email`] — email/password registration and login
//! - [`session`] — token pair issuance, refresh rotation, logout
//!
//! Callers see one [`AuthError`]; the daemon surfaces most variants as a
//! single undifferentiated unauthorized response so failures do not leak
//! which step rejected the attempt.

pub mod challenge;
pub mod email;
pub mod session;

pub use challenge::{issue_nonce, verify_login, Challenge};
pub use email::{login_email, register_email};
pub use session::{SessionIssuer, TokenPair};

use sienna_db::DbError;

/// Error types for authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed input: bad address, bad email, weak password.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No usable identity. Also covers deactivated identities, which fail
    /// closed on every auth path.
    #[error("user not found")]
    UserNotFound,

    /// Signature malformed or recovered to a different wallet. Checked
    /// before the nonce is consumed, so a bad signature does not burn the
    /// challenge.
    #[error("signature verification failed")]
    BadSignature,

    /// Nonce missing, already consumed, or expired.
    #[error("invalid or expired nonce")]
    InvalidNonce,

    /// Email/password mismatch.
    #[error("bad credentials")]
    BadCredentials,

    /// Duplicate email or handle at registration.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Token failed verification, has the wrong kind, or references no
    /// session.
    #[error("invalid token")]
    InvalidToken,

    /// Token or session past its expiry.
    #[error("expired")]
    Expired,

    #[error(transparent)]
    Db(#[from] DbError),

    /// Internal crypto failure (hashing, serialization). Not an
    /// attacker-distinguishable outcome.
    #[error("crypto failure: {0}")]
    Crypto(#[from] sienna_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, AuthError>;
