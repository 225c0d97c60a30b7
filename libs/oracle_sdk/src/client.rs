//! Seam to the blockchain client
//!
//! The SDK never talks to a node directly. It submits reads and writes through
//! [`ContractClient`], which the platform client (or a test double) implements.

use crate::error::ClientError;
use crate::types::{ContractAddress, TransactionReceipt, TransactionStatus, TxHash};
use async_trait::async_trait;
use serde_json::Value;

/// A read-only contract call
#[derive(Debug, Clone, PartialEq)]
pub struct ReadCall {
    pub address: ContractAddress,
    pub function_name: String,
    pub args: Vec<Value>,
}

impl ReadCall {
    pub fn new(address: ContractAddress, function_name: impl Into<String>) -> Self {
        Self {
            address,
            function_name: function_name.into(),
            args: Vec::new(),
        }
    }
}

/// A state-changing contract call
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    /// Signing account
    pub account: String,
    pub address: ContractAddress,
    pub function_name: String,
    pub args: Vec<Value>,
    /// Native value attached to the call; the oracle contracts always take 0
    pub value: u128,
}

/// Read/write access to deployed contracts
#[async_trait]
pub trait ContractClient: Send + Sync {
    /// Account used to sign writes, if the client has one
    fn account(&self) -> Option<String>;

    /// Run a read-only call and return its JSON result
    async fn read_contract(&self, call: ReadCall) -> Result<Value, ClientError>;

    /// Submit a write and return its hash without waiting for confirmation
    async fn write_contract(&self, call: WriteCall) -> Result<TxHash, ClientError>;

    /// Wait until the transaction reaches `status`.
    ///
    /// Implementations enforce no timeout of their own.
    async fn wait_for_transaction_receipt(
        &self,
        hash: &TxHash,
        status: TransactionStatus,
    ) -> Result<TransactionReceipt, ClientError>;
}

/// Kind of oracle contract deployed at an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    /// Oracle consumer exposing `get_status`
    OracleConsumer,
    /// Simple price feed exposing `get_price`
    SimplePriceFeed,
}

/// Probe `get_status`, then `get_price`, to find out which contract lives at
/// `address`. Returns `None` when neither call succeeds.
pub async fn detect_contract_kind(
    client: &dyn ContractClient,
    address: &ContractAddress,
) -> Option<ContractKind> {
    let candidates = [
        ("get_status", ContractKind::OracleConsumer),
        ("get_price", ContractKind::SimplePriceFeed),
    ];

    for (function_name, kind) in candidates {
        match client
            .read_contract(ReadCall::new(address.clone(), function_name))
            .await
        {
            Ok(_) => return Some(kind),
            Err(e) => tracing::debug!(%address, function_name, error = %e, "contract detection call failed"),
        }
    }

    None
}
