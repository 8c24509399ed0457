//! Authentication command handlers: wallet challenge-response, email
//! credentials, and session token management.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use sienna_auth::TokenPair;
use sienna_types::identity::{Identity, Role};
use sienna_types::unix_now;

use super::{auth_error, caller, optional_str, required_str, to_value};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

fn role_param(params: &Value) -> std::result::Result<Role, RpcError> {
    match optional_str(params, "role") {
        None => Ok(Role::Fan),
        Some(raw) => {
            Role::parse(raw).ok_or_else(|| RpcError::invalid_params("role must be fan or creator"))
        }
    }
}

/// Token envelope shared by every method that authenticates the caller.
fn session_envelope(identity: &Identity, pair: &TokenPair) -> Result {
    Ok(serde_json::json!({
        "identity": to_value(identity)?,
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "expires_in": pair.expires_in,
    }))
}

/// Issue a login challenge for a wallet.
pub async fn request_nonce(state: &Arc<DaemonState>, params: &Value) -> Result {
    let address = required_str(params, "address")?;
    let role = role_param(params)?;

    let db = state.db.lock().await;
    let challenge =
        sienna_auth::issue_nonce(&db, address, role, unix_now()).map_err(auth_error)?;

    Ok(serde_json::json!({
        "nonce": challenge.nonce,
        "challenge_message": challenge.challenge_message,
        "expires_in_ms": challenge.expires_in_ms,
    }))
}

/// Complete the challenge: verify the signature, consume the nonce, and
/// open a session.
pub async fn login(state: &Arc<DaemonState>, params: &Value) -> Result {
    let address = required_str(params, "address")?;
    let nonce = required_str(params, "nonce")?;
    let signature = required_str(params, "signature")?;
    let now = unix_now();

    let db = state.db.lock().await;
    let identity =
        sienna_auth::verify_login(&db, address, nonce, signature, now).map_err(auth_error)?;
    let pair = state
        .sessions
        .issue_tokens(&db, &identity, address, now)
        .map_err(auth_error)?;

    info!(identity_id = identity.id, "wallet login");
    session_envelope(&identity, &pair)
}

/// Register an email/password identity and open a session.
pub async fn register_email(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = required_str(params, "email")?;
    let password = required_str(params, "password")?;
    let handle = optional_str(params, "handle");
    let role = role_param(params)?;
    let now = unix_now();

    let db = state.db.lock().await;
    let identity = sienna_auth::register_email(&db, email, password, handle, role, now)
        .map_err(auth_error)?;
    let pair = state
        .sessions
        .issue_tokens(&db, &identity, email, now)
        .map_err(auth_error)?;

    info!(identity_id = identity.id, "email registration");
    session_envelope(&identity, &pair)
}

/// Log in with email/password and open a session.
pub async fn login_email(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = required_str(params, "email")?;
    let password = required_str(params, "password")?;
    let now = unix_now();

    let db = state.db.lock().await;
    let identity = sienna_auth::login_email(&db, email, password).map_err(auth_error)?;
    let pair = state
        .sessions
        .issue_tokens(&db, &identity, email, now)
        .map_err(auth_error)?;

    info!(identity_id = identity.id, "email login");
    session_envelope(&identity, &pair)
}

/// Exchange a refresh token for a fresh pair, rotating the session.
pub async fn refresh_session(state: &Arc<DaemonState>, params: &Value) -> Result {
    let refresh_token = required_str(params, "refresh_token")?;

    let db = state.db.lock().await;
    let pair = state
        .sessions
        .refresh(&db, refresh_token, unix_now())
        .map_err(auth_error)?;

    Ok(serde_json::json!({
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "expires_in": pair.expires_in,
    }))
}

/// Delete all of the caller's sessions. Idempotent.
pub async fn logout(state: &Arc<DaemonState>, params: &Value) -> Result {
    let identity = caller(state, params).await?;

    let db = state.db.lock().await;
    state.sessions.logout(&db, identity.id).map_err(auth_error)?;

    info!(identity_id = identity.id, "logout");
    Ok(serde_json::json!({"ack": true}))
}
