//! JSON-RPC provider client.
//!
//! Plain JSON-RPC 2.0 over HTTP POST. The transport sits behind a trait so
//! tests can drive the client with canned responses instead of a live
//! provider.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use sienna_types::{TxHash, WalletAddress};

use crate::{ChainError, Result};

/// HTTP request timeout for provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between receipt polls while waiting for confirmations.
pub const CONFIRMATION_POLL: Duration = Duration::from_millis(1_500);

/// One JSON-RPC call: method plus params, returning the `result` value.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value>;
}

/// The reqwest-backed transport used in production.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChainError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ChainError::Parse(e.to_string()))?;

        if let Some(err) = body.get("error") {
            return Err(ChainError::Rpc {
                code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| ChainError::Parse("response has neither result nor error".into()))
    }
}

/// A mined transaction receipt, trimmed to the fields the core needs.
#[derive(Clone, Debug)]
pub struct TxReceipt {
    pub block_number: u64,
    /// False when the transaction reverted.
    pub succeeded: bool,
    pub logs: Vec<RawLog>,
}

/// An undecoded contract log with its envelope.
#[derive(Clone, Debug)]
pub struct RawLog {
    pub address: WalletAddress,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
    pub tx_hash: TxHash,
    pub block_number: u64,
}

impl RawLog {
    /// Parse a log object as returned by `eth_getLogs`.
    pub fn from_rpc(value: &Value) -> Result<Self> {
        let address = WalletAddress::parse(str_field(value, "address")?)
            .map_err(|e| ChainError::Parse(e.to_string()))?;
        let tx_hash = TxHash::parse(str_field(value, "transactionHash")?)
            .map_err(|e| ChainError::Parse(e.to_string()))?;
        let block_number = parse_quantity(str_field(value, "blockNumber")?)?;

        let topics = value
            .get("topics")
            .and_then(Value::as_array)
            .ok_or_else(|| ChainError::Parse("log missing topics".into()))?
            .iter()
            .map(|t| {
                let s = t
                    .as_str()
                    .ok_or_else(|| ChainError::Parse("topic is not a string".into()))?;
                parse_word(s)
            })
            .collect::<Result<Vec<_>>>()?;

        let data = hex::decode(str_field(value, "data")?.trim_start_matches("0x"))
            .map_err(|e| ChainError::Parse(format!("log data: {e}")))?;

        Ok(Self {
            address,
            topics,
            data,
            tx_hash,
            block_number,
        })
    }
}

/// Address and block-range filter for log queries. The topic0 set comes
/// from the decoder so the provider only returns platform events.
#[derive(Clone, Debug)]
pub struct LogFilter {
    pub addresses: Vec<WalletAddress>,
    pub topic0: Vec<[u8; 32]>,
    pub from_block: u64,
    pub to_block: u64,
}

/// Read-only chain access. No state beyond the transport.
pub struct ChainClient {
    transport: Box<dyn RpcTransport>,
    confirmation_poll: Duration,
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("confirmation_poll", &self.confirmation_poll)
            .finish_non_exhaustive()
    }
}

impl ChainClient {
    /// Production client over HTTP.
    pub fn new(rpc_url: &str) -> Result<Self> {
        Ok(Self {
            transport: Box::new(HttpTransport::new(rpc_url)?),
            confirmation_poll: CONFIRMATION_POLL,
        })
    }

    /// Client over an arbitrary transport (tests inject canned responses
    /// and a zero poll delay here).
    pub fn with_transport(transport: Box<dyn RpcTransport>, confirmation_poll: Duration) -> Self {
        Self {
            transport,
            confirmation_poll,
        }
    }

    /// Current head block number.
    pub async fn block_number(&self) -> Result<u64> {
        let result = self.transport.call("eth_blockNumber", json!([])).await?;
        parse_quantity(as_str(&result)?)
    }

    /// Native-token balance of an address, in wei-scale base units.
    /// Balances do not fit in u64 for arbitrary wallets, so u128.
    pub async fn balance(&self, address: &WalletAddress) -> Result<u128> {
        let result = self
            .transport
            .call("eth_getBalance", json!([address.as_str(), "latest"]))
            .await?;
        parse_quantity_u128(as_str(&result)?)
    }

    /// Receipt for a transaction, or None while it is unmined.
    pub async fn transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TxReceipt>> {
        let result = self
            .transport
            .call("eth_getTransactionReceipt", json!([tx_hash.as_str()]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let block_number = parse_quantity(str_field(&result, "blockNumber")?)?;
        let succeeded = parse_quantity(str_field(&result, "status")?)? == 1;
        let logs = result
            .get("logs")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(RawLog::from_rpc).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();
        Ok(Some(TxReceipt {
            block_number,
            succeeded,
            logs,
        }))
    }

    /// Poll for a receipt until the transaction has `confirmations` blocks
    /// on top of it, bounded by `attempts` polls.
    ///
    /// Times out with [`ChainError::ConfirmationTimeout`] (retryable by the
    /// caller; no internal retry beyond the bounded attempts). A mined but
    /// reverted transaction is [`ChainError::TransactionFailed`].
    pub async fn wait_for_confirmations(
        &self,
        tx_hash: &TxHash,
        confirmations: u64,
        attempts: u32,
    ) -> Result<TxReceipt> {
        for attempt in 0..attempts {
            if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                if !receipt.succeeded {
                    return Err(ChainError::TransactionFailed(tx_hash.clone()));
                }
                let head = self.block_number().await?;
                let seen = head.saturating_sub(receipt.block_number) + 1;
                if seen >= confirmations {
                    tracing::debug!(tx_hash = %tx_hash, confirmations = seen, "transaction confirmed");
                    return Ok(receipt);
                }
                tracing::trace!(tx_hash = %tx_hash, seen, wanted = confirmations, attempt, "awaiting confirmations");
            }
            tokio::time::sleep(self.confirmation_poll).await;
        }
        Err(ChainError::ConfirmationTimeout {
            tx_hash: tx_hash.clone(),
            attempts,
        })
    }

    /// Logs matching the filter, via `eth_getLogs`.
    pub async fn logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>> {
        let addresses: Vec<&str> = filter.addresses.iter().map(WalletAddress::as_str).collect();
        let topic0: Vec<String> = filter
            .topic0
            .iter()
            .map(|t| format!("0x{}", hex::encode(t)))
            .collect();
        let params = json!([{
            "address": addresses,
            "topics": [topic0],
            "fromBlock": format!("0x{:x}", filter.from_block),
            "toBlock": format!("0x{:x}", filter.to_block),
        }]);
        let result = self.transport.call("eth_getLogs", params).await?;
        result
            .as_array()
            .ok_or_else(|| ChainError::Parse("eth_getLogs result is not an array".into()))?
            .iter()
            .map(RawLog::from_rpc)
            .collect()
    }
}

fn as_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| ChainError::Parse("expected a string value".into()))
}

fn str_field<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::Parse(format!("missing field '{field}'")))
}

/// Parse a `0x`-prefixed 32-byte word (topic or hash).
pub fn parse_word(raw: &str) -> Result<[u8; 32]> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes =
        hex::decode(digits).map_err(|e| ChainError::Parse(format!("word {raw}: {e}")))?;
    if bytes.len() != 32 {
        return Err(ChainError::Parse(format!(
            "word {raw}: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Parse a `0x`-prefixed hex quantity into u64.
pub fn parse_quantity(raw: &str) -> Result<u64> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Parse(format!("quantity without 0x prefix: {raw}")))?;
    u64::from_str_radix(digits, 16).map_err(|e| ChainError::Parse(format!("quantity {raw}: {e}")))
}

fn parse_quantity_u128(raw: &str) -> Result<u128> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Parse(format!("quantity without 0x prefix: {raw}")))?;
    u128::from_str_radix(digits, 16).map_err(|e| ChainError::Parse(format!("quantity {raw}: {e}")))
}

#[cfg(test)]
pub mod test_transport {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Replays a scripted sequence of responses, recording the calls made.
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Value>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<Result<Value>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn call(&self, method: &str, _params: Value) -> Result<Value> {
            self.calls.lock().await.push(method.to_string());
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(ChainError::Unavailable("script exhausted".into())))
        }
    }

    pub fn client_with(responses: Vec<Result<Value>>) -> ChainClient {
        ChainClient::with_transport(
            Box::new(ScriptedTransport::new(responses)),
            Duration::from_millis(0),
        )
    }
}
