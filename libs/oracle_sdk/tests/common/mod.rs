//! Shared test doubles for SDK integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use oracle_sdk::{
    ClientError, ContractAddress, ContractClient, ReadCall, TransactionReceipt, TransactionStatus,
    TxHash, WriteCall,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const ORACLE_ADDRESS: &str = "0xe0E45EC84BB780BB1cccAc1B0CB09E507eF37147";
pub const PRICE_FEED_ADDRESS: &str = "0xe328378CAF086ae0a6458395C9919a4137fCb888";
pub const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

pub fn address(s: &str) -> ContractAddress {
    s.parse().expect("valid test address")
}

pub fn status_json(eth_usd: &str, temperature: &str, news: u64) -> Value {
    json!({
        "price": {"eth_usd": eth_usd, "source": "coingecko"},
        "weather": {"temperature": temperature, "condition": "Clear", "city": "Hanoi"},
        "news": {"count": news}
    })
}

pub fn price_json(price: &str) -> Value {
    json!({"price": price, "source": "binance"})
}

#[derive(Default)]
struct MockState {
    responses: HashMap<String, Result<Value, String>>,
    reads: usize,
    writes: Vec<WriteCall>,
    waited: Vec<TxHash>,
}

/// In-memory contract client with scripted read results
pub struct MockContractClient {
    account: Option<String>,
    state: Mutex<MockState>,
}

impl MockContractClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            account: Some(ACCOUNT.to_string()),
            state: Mutex::new(MockState::default()),
        })
    }

    pub fn without_account() -> Arc<Self> {
        Arc::new(Self {
            account: None,
            state: Mutex::new(MockState::default()),
        })
    }

    pub fn respond(&self, function: &str, value: Value) {
        self.state
            .lock()
            .responses
            .insert(function.to_string(), Ok(value));
    }

    pub fn fail(&self, function: &str, message: &str) {
        self.state
            .lock()
            .responses
            .insert(function.to_string(), Err(message.to_string()));
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.state.lock().writes.clone()
    }

    pub fn waited(&self) -> Vec<TxHash> {
        self.state.lock().waited.clone()
    }
}

#[async_trait]
impl ContractClient for MockContractClient {
    fn account(&self) -> Option<String> {
        self.account.clone()
    }

    async fn read_contract(&self, call: ReadCall) -> Result<Value, ClientError> {
        let mut state = self.state.lock();
        state.reads += 1;
        match state.responses.get(&call.function_name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(ClientError::Transport(message.clone())),
            None => Err(ClientError::Rpc {
                code: -32601,
                message: format!("method {} not found", call.function_name),
            }),
        }
    }

    async fn write_contract(&self, call: WriteCall) -> Result<TxHash, ClientError> {
        let mut state = self.state.lock();
        if let Some(Err(message)) = state.responses.get(&call.function_name) {
            return Err(ClientError::Transport(message.clone()));
        }
        state.writes.push(call);
        Ok(TxHash(format!("0x{:064x}", state.writes.len())))
    }

    async fn wait_for_transaction_receipt(
        &self,
        hash: &TxHash,
        status: TransactionStatus,
    ) -> Result<TransactionReceipt, ClientError> {
        self.state.lock().waited.push(hash.clone());
        Ok(TransactionReceipt {
            hash: hash.clone(),
            status,
            raw: json!({"hash": hash.0}),
        })
    }
}

/// Let spawned tasks run until they block again
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time by `period` once per tick, letting the poller run
pub async fn advance_ticks(period: Duration, ticks: u32) {
    for _ in 0..ticks {
        tokio::time::advance(period).await;
        settle().await;
    }
}
