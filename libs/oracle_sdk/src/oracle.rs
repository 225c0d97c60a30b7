//! Facade over the oracle consumer contract (price, weather and news)

use crate::client::{ContractClient, ReadCall, WriteCall};
use crate::config::SdkOptions;
use crate::error::{ClientError, Result, SdkError};
use crate::poller::{ChangePoller, SnapshotSource, Subscriber};
use crate::types::{
    ContractAddress, OracleStatus, TransactionReceipt, TransactionStatus, TxHash, UpdateParams,
    Weather,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Reads `get_status` and decodes it into an [`OracleStatus`]
struct StatusReader {
    client: Arc<dyn ContractClient>,
    address: ContractAddress,
}

impl StatusReader {
    async fn get_status(&self) -> Result<OracleStatus> {
        const CONTEXT: &str = "Failed to get oracle status";

        let value = self
            .client
            .read_contract(ReadCall::new(self.address.clone(), "get_status"))
            .await
            .map_err(|e| SdkError::upstream(CONTEXT, e))?;

        serde_json::from_value(value)
            .map_err(|e| SdkError::upstream(CONTEXT, format!("malformed status: {e}")))
    }
}

#[async_trait]
impl SnapshotSource<OracleStatus> for StatusReader {
    async fn fetch(&self) -> Result<OracleStatus> {
        self.get_status().await
    }
}

/// SDK for the oracle consumer contract
pub struct OracleSdk {
    client: Arc<dyn ContractClient>,
    reader: Arc<StatusReader>,
    poller: ChangePoller<OracleStatus>,
}

impl OracleSdk {
    pub fn new(client: Arc<dyn ContractClient>, address: ContractAddress) -> Self {
        Self::with_options(client, address, SdkOptions::default())
    }

    pub fn with_options(
        client: Arc<dyn ContractClient>,
        address: ContractAddress,
        options: SdkOptions,
    ) -> Self {
        let reader = Arc::new(StatusReader {
            client: Arc::clone(&client),
            address,
        });
        let poller = ChangePoller::new(reader.clone(), options.poll_interval());

        Self {
            client,
            reader,
            poller,
        }
    }

    pub fn address(&self) -> &ContractAddress {
        &self.reader.address
    }

    /// Current oracle status
    pub async fn get_status(&self) -> Result<OracleStatus> {
        self.reader.get_status().await
    }

    /// ETH/USD price from a single status read
    pub async fn get_price(&self) -> Result<f64> {
        let status = self.get_status().await?;
        status
            .price
            .eth_usd
            .trim()
            .parse()
            .map_err(|_| SdkError::InvalidValue {
                field: "price.eth_usd",
                value: status.price.eth_usd.clone(),
            })
    }

    pub async fn get_weather(&self) -> Result<Weather> {
        Ok(self.get_status().await?.weather)
    }

    pub async fn get_news_count(&self) -> Result<u64> {
        Ok(self.get_status().await?.news.count)
    }

    /// Submit `update_all`; does not wait for confirmation
    pub async fn update_oracle(&self, params: Option<UpdateParams>) -> Result<TxHash> {
        const CONTEXT: &str = "Failed to update oracle";

        let account = self
            .client
            .account()
            .ok_or_else(|| SdkError::upstream(CONTEXT, ClientError::AccountUnavailable))?;
        let args = params.unwrap_or_default().to_args();

        let hash = self
            .client
            .write_contract(WriteCall {
                account,
                address: self.reader.address.clone(),
                function_name: "update_all".to_string(),
                args,
                value: 0,
            })
            .await
            .map_err(|e| SdkError::upstream(CONTEXT, e))?;

        info!(tx = %hash, contract = %self.reader.address, "update_all submitted");
        Ok(hash)
    }

    /// Wait until the transaction is finalized. No timeout is applied.
    pub async fn wait_for_finalization(&self, hash: &TxHash) -> Result<TransactionReceipt> {
        self.client
            .wait_for_transaction_receipt(hash, TransactionStatus::Finalized)
            .await
            .map_err(|e| SdkError::upstream("Failed to wait for finalization", e))
    }

    /// Subscribe to status changes; starts polling on the first subscriber
    pub fn on_update(&self, callback: Subscriber<OracleStatus>) -> Result<()> {
        self.poller.on_update(callback)
    }

    /// Unsubscribe; stops polling when the last subscriber leaves
    pub fn off_update(&self, callback: &Subscriber<OracleStatus>) {
        self.poller.off_update(callback)
    }

    /// Period between change checks
    pub fn poll_interval(&self) -> Duration {
        self.poller.interval()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    /// Stop polling and drop all subscribers. The instance accepts no new
    /// subscribers afterwards.
    pub fn destroy(&self) {
        self.poller.destroy()
    }
}
