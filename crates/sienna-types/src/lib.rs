//! # sienna-types
//!
//! Shared domain types used across the Sienna workspace: wallet identities,
//! creator profiles, payments, subscriptions, and the decoded contract
//! events the projector consumes.

pub mod address;
pub mod creator;
pub mod event;
pub mod identity;
pub mod payment;
pub mod subscription;

pub use address::{TxHash, WalletAddress};

/// Row id of an identity in the relational store.
pub type IdentityId = i64;

/// On-chain subscription token id (ERC-721 style, fits in u64).
pub type TokenId = u64;

/// Monetary amount in base units of the platform token.
pub type Amount = u64;

/// Login nonce lifetime in seconds (5 minutes).
pub const NONCE_TTL_SECS: u64 = 300;

/// Access token lifetime in seconds (15 minutes).
pub const ACCESS_TOKEN_TTL_SECS: u64 = 900;

/// Refresh token / session lifetime in seconds (30 days).
pub const REFRESH_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default subscription period in seconds (30 days).
pub const SUBSCRIPTION_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;

/// Default platform fee rate, percent of gross payment.
pub const DEFAULT_FEE_RATE_PCT: u64 = 10;

/// Default number of confirmations before a transaction is trusted.
pub const DEFAULT_CONFIRMATIONS: u64 = 3;

/// Prefix of the message a wallet signs to prove ownership. The signed
/// payload is this prefix followed by the issued nonce.
pub const CHALLENGE_PREFIX: &str = "Sign this message to authenticate with Sienna: ";

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
