//! # sienna-chain
//!
//! Read-only access to the chain and delivery of decoded contract events.
//!
//! ## Modules
//!
//! - [`client`] — JSON-RPC provider client (balances, receipts,
//!   confirmation waiting, log queries)
//! - [`handle`] — explicit configured/unconfigured client handle
//! - [`decode`] — fixed-ABI log decoder for the six platform events
//! - [`bus`] — broadcast event bus the projector subscribes to
//! - [`source`] — polling event source with persisted cursor and backoff
//!
//! Delivery downstream is at-least-once and unordered. Nothing in this
//! crate deduplicates; consumers key every effect on the natural
//! identifiers carried by the events.

pub mod bus;
pub mod client;
pub mod decode;
pub mod handle;
pub mod source;

pub use bus::EventBus;
pub use client::{ChainClient, LogFilter, RawLog, TxReceipt};
pub use handle::ChainHandle;
pub use source::{ContractEventSource, CursorStore, SourceConfig};

use sienna_types::TxHash;

/// Error types for chain access.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Provider unreachable. Request-path callers fail closed on this;
    /// the event source backs off and retries.
    #[error("chain provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// A response or log did not have the expected shape.
    #[error("malformed chain data: {0}")]
    Parse(String),

    /// No chain client was configured at startup.
    #[error("no chain provider configured")]
    Unconfigured,

    /// The transaction did not reach the required confirmations within the
    /// bounded polling window. Retryable by the caller.
    #[error("transaction {tx_hash} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { tx_hash: TxHash, attempts: u32 },

    /// The transaction was mined but reverted.
    #[error("transaction {0} failed on-chain")]
    TransactionFailed(TxHash),

    /// The cursor store behind the event source failed.
    #[error("cursor store error: {0}")]
    Cursor(String),

    #[error("invalid chain configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
