//! # sienna-ledger
//!
//! The payment ledger: fee splitting and the payment status machine.
//!
//! Every payment row satisfies `platform_fee + creator_amount ==
//! total_amount`, and status only ever moves forward (processing →
//! completed → refunded, or processing → failed). Money-moving operations
//! couple the status transition and the creator's earnings counter in one
//! database transaction.

pub mod ledger;
pub mod split;

pub use ledger::{complete, fail, record, refund};
pub use split::FeeSplit;

use sienna_db::DbError;
use sienna_types::payment::PaymentStatus;

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A payment with this transaction hash already exists. The duplicate
    /// signal for redelivered chain events.
    #[error("duplicate transaction")]
    DuplicateTransaction,

    #[error("payment not found")]
    NotFound,

    /// The payment is not in a status that permits the operation.
    #[error("invalid payment state: {0:?}")]
    InvalidState(PaymentStatus),

    /// The requestor is neither the payer nor the receiving creator.
    #[error("forbidden")]
    Forbidden,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Fee arithmetic overflowed u64.
    #[error("amount overflow")]
    Overflow,

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Db(e.into())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
