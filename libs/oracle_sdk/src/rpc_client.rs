//! JSON-RPC implementation of [`ContractClient`]
//!
//! Targets a contract gateway that takes calls as JSON: a function name plus
//! its arguments, never ABI-encoded calldata. A stock EVM node will reject
//! these requests; reaching one needs a [`ContractClient`] that encodes
//! calldata itself.
//!
//! Talks to the gateway over HTTP:
//!
//! - reads: `gen_call` with `{to, from, function, args}`
//! - writes: `eth_sendTransaction` with `{from, to, value, function, args}`;
//!   the node signs with the account it manages for `from`
//! - receipts: `eth_getTransactionByHash`, polled until the transaction's
//!   `status` reaches the awaited value or a failure status
//!
//! Receipt polling has no deadline of its own; wrap the call in
//! `tokio::time::timeout` when a bound is needed.

use crate::client::{ContractClient, ReadCall, WriteCall};
use crate::error::ClientError;
use crate::types::{TransactionReceipt, TransactionStatus, TxHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Default interval between receipt polls
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Contract client backed by a JSON-RPC node endpoint
pub struct RpcContractClient {
    http: reqwest::Client,
    endpoint: Url,
    account: Option<String>,
    receipt_poll_interval: Duration,
    next_id: AtomicU64,
}

impl RpcContractClient {
    pub fn new(endpoint: &str, account: Option<String>) -> Result<Self, ClientError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ClientError::Transport(format!("invalid RPC URL {endpoint}: {e}")))?;

        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            account,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!(method, id = request.id, "rpc request");

        let response: RpcResponse = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    fn sender(&self) -> Value {
        self.account.as_deref().map_or(Value::Null, |a| json!(a))
    }
}

#[async_trait]
impl ContractClient for RpcContractClient {
    fn account(&self) -> Option<String> {
        self.account.clone()
    }

    async fn read_contract(&self, call: ReadCall) -> Result<Value, ClientError> {
        self.call(
            "gen_call",
            json!([{
                "to": call.address,
                "from": self.sender(),
                "function": call.function_name,
                "args": call.args,
            }]),
        )
        .await
    }

    async fn write_contract(&self, call: WriteCall) -> Result<TxHash, ClientError> {
        let result = self
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": call.account,
                    "to": call.address,
                    "value": format!("0x{:x}", call.value),
                    "function": call.function_name,
                    "args": call.args,
                }]),
            )
            .await?;

        result
            .as_str()
            .map(|hash| TxHash(hash.to_string()))
            .ok_or_else(|| ClientError::InvalidResponse(format!("expected tx hash, got {result}")))
    }

    async fn wait_for_transaction_receipt(
        &self,
        hash: &TxHash,
        status: TransactionStatus,
    ) -> Result<TransactionReceipt, ClientError> {
        let mut ticker = tokio::time::interval(self.receipt_poll_interval);

        loop {
            ticker.tick().await;

            let tx = self.call("eth_getTransactionByHash", json!([hash.0])).await?;
            let Some(current) = tx.get("status").and_then(Value::as_str) else {
                debug!(%hash, "transaction not visible yet");
                continue;
            };

            let current = TransactionStatus::from_name(current);
            if current == status {
                return Ok(TransactionReceipt {
                    hash: hash.clone(),
                    status: current,
                    raw: tx,
                });
            }
            if current == TransactionStatus::Canceled {
                return Err(ClientError::TransactionFailed {
                    hash: hash.0.clone(),
                    status: current.to_string(),
                });
            }

            debug!(%hash, status = %current, awaited = %status, "transaction not terminal yet");
        }
    }
}
