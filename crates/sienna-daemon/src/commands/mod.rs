//! RPC command handlers, grouped by domain.

pub mod auth;
pub mod creators;
pub mod payments;
pub mod status;
pub mod subscriptions;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use sienna_auth::AuthError;
use sienna_chain::ChainError;
use sienna_ledger::LedgerError;
use sienna_subs::LifecycleError;
use sienna_types::identity::Identity;
use sienna_types::{TxHash, WalletAddress};

use crate::rpc::RpcError;
use crate::DaemonState;

// Parameter extraction

pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

pub(crate) fn required_u64(params: &Value, key: &str) -> Result<u64, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

pub(crate) fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub(crate) fn wallet_param(params: &Value, key: &str) -> Result<WalletAddress, RpcError> {
    WalletAddress::parse(required_str(params, key)?)
        .map_err(|e| RpcError::invalid_params(&e.to_string()))
}

pub(crate) fn tx_hash_param(params: &Value, key: &str) -> Result<TxHash, RpcError> {
    TxHash::parse(required_str(params, key)?).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

/// Authenticate the caller from the `access_token` parameter.
pub(crate) async fn caller(
    state: &Arc<DaemonState>,
    params: &Value,
) -> Result<Identity, RpcError> {
    let token = required_str(params, "access_token")?;
    let db = state.db.lock().await;
    state
        .sessions
        .authenticate(&db, token, sienna_types::unix_now())
        .map_err(auth_error)
}

// Domain error → RPC error mapping. Authentication failures collapse to
// one code; the variant is logged, never surfaced.

pub(crate) fn auth_error(err: AuthError) -> RpcError {
    match err {
        AuthError::Validation(detail) => RpcError::invalid_params(&detail),
        AuthError::Conflict(detail) => RpcError::conflict(&detail),
        AuthError::Db(e) => {
            warn!("auth db error: {e}");
            RpcError::internal_error()
        }
        AuthError::Crypto(e) => {
            warn!("auth crypto error: {e}");
            RpcError::internal_error()
        }
        other => {
            debug!("authentication rejected: {other}");
            RpcError::unauthorized()
        }
    }
}

pub(crate) fn ledger_error(err: LedgerError) -> RpcError {
    match err {
        LedgerError::DuplicateTransaction => RpcError::conflict("transaction already recorded"),
        LedgerError::NotFound => RpcError::not_found("payment"),
        LedgerError::InvalidState(status) => {
            RpcError::invalid_state(&format!("payment is {}", status.as_str()))
        }
        LedgerError::Forbidden => RpcError::forbidden(),
        LedgerError::Validation(detail) => RpcError::invalid_params(&detail),
        LedgerError::Overflow => RpcError::invalid_params("amount overflows fee arithmetic"),
        LedgerError::Db(e) => {
            warn!("ledger db error: {e}");
            RpcError::internal_error()
        }
    }
}

pub(crate) fn lifecycle_error(err: LifecycleError) -> RpcError {
    match err {
        LifecycleError::DuplicateToken => RpcError::conflict("subscription token already recorded"),
        LifecycleError::NotFound => RpcError::not_found("subscription"),
        LifecycleError::Forbidden => RpcError::forbidden(),
        LifecycleError::InvalidState => RpcError::invalid_state("subscription is not active"),
        LifecycleError::Validation(detail) => RpcError::invalid_params(&detail),
        LifecycleError::Db(e) => {
            warn!("subscription db error: {e}");
            RpcError::internal_error()
        }
    }
}

/// Chain faults are retryable for the caller; a mined-but-reverted
/// transaction is not.
pub(crate) fn chain_error(err: ChainError) -> RpcError {
    match err {
        ChainError::Unconfigured => RpcError::chain_unavailable("no chain provider configured"),
        ChainError::Unavailable(detail) => RpcError::chain_unavailable(&detail),
        ChainError::Rpc { code, message } => {
            RpcError::chain_unavailable(&format!("provider error {code}: {message}"))
        }
        ChainError::ConfirmationTimeout { .. } => {
            RpcError::chain_unavailable("confirmation wait timed out")
        }
        ChainError::TransactionFailed(tx_hash) => {
            RpcError::invalid_state(&format!("transaction {tx_hash} reverted"))
        }
        other => {
            warn!("chain error: {other}");
            RpcError::internal_error()
        }
    }
}

pub(crate) fn db_error(err: sienna_db::DbError) -> RpcError {
    warn!("db error: {err}");
    RpcError::internal_error()
}

/// Serialize a domain value into the RPC result envelope.
pub(crate) fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| {
        warn!("response serialization error: {e}");
        RpcError::internal_error()
    })
}
