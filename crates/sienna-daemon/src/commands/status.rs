//! Daemon diagnostics.

use std::sync::Arc;

use serde_json::Value;

use sienna_db::queries;

use super::db_error;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Liveness and progress snapshot. No auth.
pub async fn daemon_status(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    let cursor = queries::settings::projector_cursor(&db).map_err(db_error)?;

    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "chain_configured": state.chain.is_configured(),
        "events_published": state.bus.sequence(),
        "projector_cursor": cursor,
    }))
}
