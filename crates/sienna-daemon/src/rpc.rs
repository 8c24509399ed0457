//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! line-delimited JSON-RPC method calls to the command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "INVALID_REQUEST".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602). Also carries validation failures (malformed
    /// address, zero amount, bad role string).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603). Details are logged, never leaked.
    pub fn internal_error() -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: None,
        }
    }

    // Application errors

    /// Unauthorized (-32001). Every authentication failure collapses to
    /// this; the specific cause is logged server-side only.
    pub fn unauthorized() -> Self {
        Self {
            code: -32001,
            message: "UNAUTHORIZED".to_string(),
            data: None,
        }
    }

    /// Forbidden (-32003): authenticated but not allowed to act on this row.
    pub fn forbidden() -> Self {
        Self {
            code: -32003,
            message: "FORBIDDEN".to_string(),
            data: None,
        }
    }

    /// Not found (-32004).
    pub fn not_found(what: &str) -> Self {
        Self {
            code: -32004,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"what": what})),
        }
    }

    /// Invalid state (-32005): the row exists but the requested transition
    /// is not legal from its current status.
    pub fn invalid_state(detail: &str) -> Self {
        Self {
            code: -32005,
            message: "INVALID_STATE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Conflict (-32009): duplicate transaction, duplicate subscription
    /// token, or a taken display name.
    pub fn conflict(detail: &str) -> Self {
        Self {
            code: -32009,
            message: "CONFLICT".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Chain unavailable (-32020). Always retryable.
    pub fn chain_unavailable(detail: &str) -> Self {
        Self {
            code: -32020,
            message: "CHAIN_UNAVAILABLE".to_string(),
            data: Some(serde_json::json!({"detail": detail, "retryable": true})),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("RPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
///
/// There is no global auth gate: methods that need a caller take an
/// `access_token` parameter and authenticate it themselves.
async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();

    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request());
    }

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Authentication
        "request_nonce" => commands::auth::request_nonce(&state, &request.params).await,
        "login" => commands::auth::login(&state, &request.params).await,
        "register_email" => commands::auth::register_email(&state, &request.params).await,
        "login_email" => commands::auth::login_email(&state, &request.params).await,
        "refresh_session" => commands::auth::refresh_session(&state, &request.params).await,
        "logout" => commands::auth::logout(&state, &request.params).await,

        // Payments
        "record_payment" => commands::payments::record_payment(&state, &request.params).await,
        "refund_payment" => commands::payments::refund_payment(&state, &request.params).await,
        "list_payments" => commands::payments::list_payments(&state, &request.params).await,
        "wallet_balance" => commands::payments::wallet_balance(&state, &request.params).await,

        // Subscriptions
        "create_subscription" => {
            commands::subscriptions::create_subscription(&state, &request.params).await
        }
        "renew_subscription" => {
            commands::subscriptions::renew_subscription(&state, &request.params).await
        }
        "cancel_subscription" => {
            commands::subscriptions::cancel_subscription(&state, &request.params).await
        }
        "list_subscriptions" => {
            commands::subscriptions::list_subscriptions(&state, &request.params).await
        }
        "check_access" => commands::subscriptions::check_access(&state, &request.params).await,

        // Creators
        "get_creator" => commands::creators::get_creator(&state, &request.params).await,
        "update_creator_profile" => {
            commands::creators::update_creator_profile(&state, &request.params).await
        }

        // Diagnostics
        "daemon_status" => commands::status::daemon_status(&state).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(RpcError::unauthorized().code, -32001);
        assert_eq!(RpcError::conflict("dup").code, -32009);
        assert_eq!(RpcError::method_not_found("unknown").code, -32601);

        let err = RpcError::chain_unavailable("provider down");
        assert_eq!(err.code, -32020);
        let data = err.data.expect("data");
        assert_eq!(data["retryable"], serde_json::json!(true));
    }

    #[test]
    fn test_internal_error_carries_no_detail() {
        assert!(RpcError::internal_error().data.is_none());
    }

    #[test]
    fn test_rpc_response_shapes() {
        let resp = RpcResponse::success(serde_json::json!(1), serde_json::json!({"ack": true}));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());

        let resp = RpcResponse::error(serde_json::json!(1), RpcError::forbidden());
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
    }
}
