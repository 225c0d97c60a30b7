//! Facade over the simple price feed contract

use crate::client::{ContractClient, ReadCall, WriteCall};
use crate::config::SdkOptions;
use crate::error::{ClientError, Result, SdkError};
use crate::poller::{ChangePoller, SnapshotSource, Subscriber};
use crate::types::{ContractAddress, PriceData, TransactionReceipt, TransactionStatus, TxHash};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

struct PriceReader {
    client: Arc<dyn ContractClient>,
    address: ContractAddress,
}

impl PriceReader {
    async fn get_price(&self) -> Result<PriceData> {
        const CONTEXT: &str = "Failed to get price";

        let value = self
            .client
            .read_contract(ReadCall::new(self.address.clone(), "get_price"))
            .await
            .map_err(|e| SdkError::upstream(CONTEXT, e))?;

        serde_json::from_value(value)
            .map_err(|e| SdkError::upstream(CONTEXT, format!("malformed price: {e}")))
    }
}

#[async_trait]
impl SnapshotSource<PriceData> for PriceReader {
    async fn fetch(&self) -> Result<PriceData> {
        self.get_price().await
    }
}

/// SDK for the simple price feed contract
pub struct PriceFeedSdk {
    client: Arc<dyn ContractClient>,
    reader: Arc<PriceReader>,
    poller: ChangePoller<PriceData>,
    settle_delay: Duration,
}

impl PriceFeedSdk {
    pub fn new(client: Arc<dyn ContractClient>, address: ContractAddress) -> Self {
        Self::with_options(client, address, SdkOptions::default())
    }

    pub fn with_options(
        client: Arc<dyn ContractClient>,
        address: ContractAddress,
        options: SdkOptions,
    ) -> Self {
        let reader = Arc::new(PriceReader {
            client: Arc::clone(&client),
            address,
        });
        let poller = ChangePoller::new(reader.clone(), options.poll_interval());

        Self {
            client,
            reader,
            poller,
            settle_delay: options.settle_delay(),
        }
    }

    pub fn address(&self) -> &ContractAddress {
        &self.reader.address
    }

    pub async fn get_price(&self) -> Result<PriceData> {
        self.reader.get_price().await
    }

    /// Price parsed as a number
    pub async fn get_price_number(&self) -> Result<f64> {
        let data = self.get_price().await?;
        data.price.trim().parse().map_err(|_| SdkError::InvalidValue {
            field: "price",
            value: data.price.clone(),
        })
    }

    /// Submit `update_price`, triggering a consensus fetch on-chain
    pub async fn update_price(&self) -> Result<TxHash> {
        const CONTEXT: &str = "Failed to update price";

        let account = self
            .client
            .account()
            .ok_or_else(|| SdkError::upstream(CONTEXT, ClientError::AccountUnavailable))?;

        let hash = self
            .client
            .write_contract(WriteCall {
                account,
                address: self.reader.address.clone(),
                function_name: "update_price".to_string(),
                args: Vec::new(),
                value: 0,
            })
            .await
            .map_err(|e| SdkError::upstream(CONTEXT, e))?;

        info!(tx = %hash, contract = %self.reader.address, "update_price submitted");
        Ok(hash)
    }

    /// Wait until the transaction is finalized. No timeout is applied.
    pub async fn wait_for_finalization(&self, hash: &TxHash) -> Result<TransactionReceipt> {
        self.client
            .wait_for_transaction_receipt(hash, TransactionStatus::Finalized)
            .await
            .map_err(|e| SdkError::upstream("Failed to wait for finalization", e))
    }

    /// Update, wait for finalization, let state settle, then read back
    pub async fn update_price_and_wait(&self) -> Result<PriceData> {
        let hash = self.update_price().await?;
        self.wait_for_finalization(&hash).await?;

        debug!(delay_ms = self.settle_delay.as_millis() as u64, "waiting for state to settle");
        tokio::time::sleep(self.settle_delay).await;

        self.get_price().await
    }

    pub fn on_update(&self, callback: Subscriber<PriceData>) -> Result<()> {
        self.poller.on_update(callback)
    }

    pub fn off_update(&self, callback: &Subscriber<PriceData>) {
        self.poller.off_update(callback)
    }

    /// Period between change checks
    pub fn poll_interval(&self) -> Duration {
        self.poller.interval()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    pub fn destroy(&self) {
        self.poller.destroy()
    }
}
