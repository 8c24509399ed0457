//! Creator profile command handlers.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use sienna_db::{queries, DbError};
use sienna_types::Amount;

use super::{caller, db_error, optional_str, to_value, wallet_param};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Public creator profile. No auth; this is the discovery surface.
pub async fn get_creator(state: &Arc<DaemonState>, params: &Value) -> Result {
    let wallet = wallet_param(params, "wallet")?;

    let db = state.db.lock().await;
    let profile = queries::creators::get(&db, &wallet)
        .map_err(db_error)?
        .ok_or_else(|| RpcError::not_found("creator"))?;
    to_value(&profile)
}

/// Update the caller's own creator profile. Only the off-chain fields are
/// writable here; registration and verification belong to the chain.
pub async fn update_creator_profile(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;
    let display_name = optional_str(params, "display_name");
    let subscription_price: Option<Amount> =
        params.get("subscription_price").and_then(|v| v.as_u64());

    if display_name.is_none() && subscription_price.is_none() {
        return Err(RpcError::invalid_params(
            "display_name or subscription_price required",
        ));
    }
    if let Some(name) = display_name {
        if name.trim().is_empty() || name.len() > 64 {
            return Err(RpcError::invalid_params(
                "display_name must be 1-64 characters",
            ));
        }
    }

    let wallet = identity.wallet_address.as_ref().ok_or_else(RpcError::forbidden)?;

    let db = state.db.lock().await;
    let profile = queries::creators::get(&db, wallet)
        .map_err(db_error)?
        .ok_or_else(|| RpcError::not_found("creator"))?;
    if profile.identity_id != identity.id {
        return Err(RpcError::forbidden());
    }

    match queries::creators::update_profile(&db, wallet, display_name, subscription_price) {
        Ok(_) => {}
        Err(DbError::Constraint(_)) => {
            return Err(RpcError::conflict("display name already taken"));
        }
        Err(e) => return Err(db_error(e)),
    }

    let updated = queries::creators::get(&db, wallet)
        .map_err(db_error)?
        .ok_or_else(|| RpcError::not_found("creator"))?;

    info!(identity_id = identity.id, wallet = %wallet, "creator profile updated");
    to_value(&updated)
}
