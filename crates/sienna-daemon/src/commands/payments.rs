//! Payment command handlers.
//!
//! `record_payment` is the request-path mirror of the projector's
//! `PaymentReceived` arm: it waits for the configured confirmations first
//! and fails closed when no chain is reachable. Whichever of the two paths
//! lands first wins the insert; the loser surfaces (or swallows) the
//! duplicate.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use sienna_db::queries;
use sienna_types::payment::PaymentKind;
use sienna_types::unix_now;

use super::{
    caller, chain_error, db_error, ledger_error, required_str, required_u64, to_value,
    tx_hash_param, wallet_param,
};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Record a confirmed on-chain payment from the caller to a creator.
pub async fn record_payment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;
    let tx_hash = tx_hash_param(params, "tx_hash")?;
    let creator = wallet_param(params, "creator_address")?;
    let kind = PaymentKind::parse(required_str(params, "kind")?)
        .ok_or_else(|| {
            RpcError::invalid_params("kind must be tip, subscription, or content_purchase")
        })?;
    let amount = required_u64(params, "amount")?;

    {
        let db = state.db.lock().await;
        if queries::creators::get(&db, &creator)
            .map_err(db_error)?
            .is_none()
        {
            return Err(RpcError::not_found("creator"));
        }
    }

    // Confirmation wait happens outside the db lock; the provider can take
    // seconds to answer.
    let client = state.chain.client().map_err(chain_error)?;
    client
        .wait_for_confirmations(
            &tx_hash,
            state.config.chain.confirmations,
            state.config.chain.confirmation_attempts,
        )
        .await
        .map_err(chain_error)?;

    let db = state.db.lock().await;
    let payment = sienna_ledger::record(
        &db,
        &state.split,
        &tx_hash,
        identity.id,
        &creator,
        kind,
        amount,
        unix_now(),
    )
    .map_err(ledger_error)?;

    info!(tx_hash = %payment.tx_hash, payer_id = identity.id, amount, "payment recorded");
    to_value(&payment)
}

/// Refund a completed payment. Allowed for the payer or the receiving
/// creator only.
pub async fn refund_payment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;
    let tx_hash = tx_hash_param(params, "tx_hash")?;

    let mut db = state.db.lock().await;
    let payment = sienna_ledger::refund(
        &mut db,
        &tx_hash,
        identity.id,
        identity.wallet_address.as_ref(),
        unix_now(),
    )
    .map_err(ledger_error)?;

    info!(tx_hash = %payment.tx_hash, requestor_id = identity.id, "payment refunded");
    to_value(&payment)
}

/// Payments the caller has made, plus payments received if the caller's
/// wallet carries a creator profile.
pub async fn list_payments(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;

    let db = state.db.lock().await;
    let sent = queries::payments::list_by_payer(&db, identity.id).map_err(db_error)?;
    let received = match &identity.wallet_address {
        Some(wallet) if queries::creators::get(&db, wallet).map_err(db_error)?.is_some() => {
            queries::payments::list_by_creator(&db, wallet).map_err(db_error)?
        }
        _ => Vec::new(),
    };

    Ok(serde_json::json!({
        "sent": to_value(&sent)?,
        "received": to_value(&received)?,
    }))
}

/// On-chain balance of an arbitrary wallet. No auth; balances are public
/// chain state.
pub async fn wallet_balance(state: &Arc<DaemonState>, params: &Value) -> Result {
    let address = wallet_param(params, "address")?;

    let client = state.chain.client().map_err(chain_error)?;
    let balance = client.balance(&address).await.map_err(chain_error)?;

    // Balances are u128; serialized as a decimal string to stay JSON-safe.
    Ok(serde_json::json!({
        "address": address.as_str(),
        "balance": balance.to_string(),
    }))
}
