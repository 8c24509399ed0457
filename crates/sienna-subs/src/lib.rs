//! # sienna-subs
//!
//! Subscription lifecycle over the membership-token rows.
//!
//! The creator's `subscriber_count` always equals the number of `active = 1`
//! rows for that creator: creation and reactivating renewal increment it,
//! cancellation and the lapse sweep decrement it, and every adjustment rides
//! in the same database transaction as the row change.

pub mod lifecycle;

pub use lifecycle::{cancel, cancel_from_chain, create, expire_lapsed, renew};

use sienna_db::DbError;

/// Error types for subscription operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A subscription with this token id already exists. The duplicate
    /// signal for redelivered chain events.
    #[error("duplicate subscription token")]
    DuplicateToken,

    #[error("subscription not found")]
    NotFound,

    /// The requestor is not the subscriber.
    #[error("forbidden")]
    Forbidden,

    /// The subscription is already inactive.
    #[error("subscription not active")]
    InvalidState,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(e: rusqlite::Error) -> Self {
        LifecycleError::Db(e.into())
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
