//! # Oracle SDK
//!
//! Typed access to two on-chain oracle contracts plus polling-based change
//! notifications.
//!
//! ## Facades
//!
//! - [`OracleSdk`] fronts the oracle consumer contract: `get_status` returns
//!   an [`OracleStatus`] (ETH price, weather, news count) and `update_all`
//!   asks the contract to refresh all three.
//! - [`PriceFeedSdk`] fronts the simple price feed: `get_price` and
//!   `update_price`.
//!
//! Both submit calls through a [`ContractClient`]. [`RpcContractClient`] is a
//! JSON-RPC implementation; tests and embedders can supply their own.
//!
//! ## Change notifications
//!
//! ```text
//! on_update(cb) ──► registry ──(first subscriber)──► timer task
//!                                                       │ every poll interval
//!                                                       ▼
//!                        subscribers ◄── fan-out ◄── read + compare
//! ```
//!
//! Registering the first subscriber starts a single timer per SDK instance;
//! removing the last stops it. A tick re-reads the contract and notifies
//! every subscriber only when the snapshot differs from the previous one.
//! This is polling, not push delivery: changes surface up to one poll
//! interval late, and states that come and go between two ticks are never
//! seen.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use oracle_sdk::{subscriber, OracleSdk, RpcContractClient};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(RpcContractClient::new(
//!     "http://localhost:4000/api",
//!     Some("0x701a6b9abaf65a0e1d4ae1a2a9e5b8f3a1c2d4e5".to_string()),
//! )?);
//! let sdk = OracleSdk::new(client, "0xe0E45EC84BB780BB1cccAc1B0CB09E507eF37147".parse()?);
//!
//! let status = sdk.get_status().await?;
//! println!("ETH ${} ({})", status.price.eth_usd, status.price.source);
//!
//! sdk.on_update(subscriber(|status: &oracle_sdk::OracleStatus| {
//!     println!("new price: {}", status.price.eth_usd);
//!     Ok(())
//! }))?;
//!
//! let tx = sdk.update_oracle(None).await?;
//! sdk.wait_for_finalization(&tx).await?;
//! sdk.destroy();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod oracle;
pub mod poller;
pub mod price_feed;
pub mod rpc_client;
pub mod types;

pub use client::{detect_contract_kind, ContractClient, ContractKind, ReadCall, WriteCall};
pub use config::SdkOptions;
pub use error::{CallbackError, ClientError, Result, SdkError};
pub use oracle::OracleSdk;
pub use poller::{subscriber, ChangePoller, SnapshotSource, Subscriber};
pub use price_feed::PriceFeedSdk;
pub use rpc_client::RpcContractClient;
pub use types::{
    ContractAddress, News, OracleStatus, PriceData, PriceInfo, TransactionReceipt,
    TransactionStatus, TxHash, UpdateParams, Weather,
};
