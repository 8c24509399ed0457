//! Subscription command handlers.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use sienna_db::queries;
use sienna_types::unix_now;

use super::{
    caller, chain_error, db_error, lifecycle_error, required_u64, to_value, tx_hash_param,
    wallet_param,
};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Record a freshly minted subscription token for the caller. Waits for
/// the minting transaction to confirm, like `record_payment`.
pub async fn create_subscription(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;
    let token_id = required_u64(params, "token_id")?;
    let creator = wallet_param(params, "creator_address")?;
    let tx_hash = tx_hash_param(params, "tx_hash")?;
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

    let client = state.chain.client().map_err(chain_error)?;
    client
        .wait_for_confirmations(
            &tx_hash,
            state.config.chain.confirmations,
            state.config.chain.confirmation_attempts,
        )
        .await
        .map_err(chain_error)?;

    let mut db = state.db.lock().await;
    let subscription = sienna_subs::create(
        &mut db,
        token_id,
        identity.id,
        &creator,
        amount,
        None,
        state.config.subscriptions.period_secs,
        unix_now(),
    )
    .map_err(lifecycle_error)?;

    info!(token_id, subscriber_id = identity.id, "subscription created");
    to_value(&subscription)
}

/// Extend the caller's subscription by one period, compounding from the
/// stored expiry.
pub async fn renew_subscription(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;
    let token_id = required_u64(params, "token_id")?;

    let mut db = state.db.lock().await;
    let subscription = sienna_subs::renew(
        &mut db,
        token_id,
        identity.id,
        state.config.subscriptions.period_secs,
    )
    .map_err(lifecycle_error)?;

    info!(token_id, subscriber_id = identity.id, "subscription renewed");
    to_value(&subscription)
}

/// Cancel the caller's active subscription.
pub async fn cancel_subscription(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;
    let token_id = required_u64(params, "token_id")?;

    let mut db = state.db.lock().await;
    let subscription = sienna_subs::cancel(&mut db, token_id, identity.id, unix_now())
        .map_err(lifecycle_error)?;

    info!(token_id, subscriber_id = identity.id, "subscription cancelled");
    to_value(&subscription)
}

/// All of the caller's subscriptions, active or not.
pub async fn list_subscriptions(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;

    let db = state.db.lock().await;
    let subscriptions =
        queries::subscriptions::list_by_subscriber(&db, identity.id).map_err(db_error)?;
    to_value(&subscriptions)
}

/// Whether the caller currently has access to a creator's content:
/// an active subscription whose expiry has not passed.
pub async fn check_access(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;
    let creator = wallet_param(params, "creator_address")?;

    let db = state.db.lock().await;
    let active = queries::subscriptions::find_for_creator(&db, identity.id, &creator)
        .map_err(db_error)?
        .map(|sub| sub.is_effectively_active(unix_now()))
        .unwrap_or(false);

    Ok(serde_json::json!({"active": active}))
}
