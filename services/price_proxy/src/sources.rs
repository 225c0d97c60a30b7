//! Upstream price sources and the primary/fallback chain

use crate::config::{ApiKeys, UpstreamConfig};
use crate::error::{ProxyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const ALL_FAILED_MESSAGE: &str = "Coingecko and Binance both failed";

/// Ticker symbol to CoinGecko coin id; unknown symbols are lower-cased
pub fn coingecko_id(symbol: &str) -> String {
    match symbol.to_ascii_uppercase().as_str() {
        "ETH" => "ethereum".to_string(),
        "BTC" => "bitcoin".to_string(),
        "SOL" => "solana".to_string(),
        "MATIC" => "matic-network".to_string(),
        "AVAX" => "avalanche-2".to_string(),
        "ADA" => "cardano".to_string(),
        "DOT" => "polkadot".to_string(),
        "LINK" => "chainlink".to_string(),
        _ => symbol.to_ascii_lowercase(),
    }
}

/// Ticker symbol to the Binance USDT pair
pub fn binance_pair(symbol: &str) -> String {
    format!("{}USDT", symbol.to_ascii_uppercase())
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One upstream price API
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Label reported in the `source` field of a quote
    fn name(&self) -> &'static str;

    /// Whether credentials for this source are present
    fn is_configured(&self) -> bool;

    /// USD price for `symbol`; `Ok(None)` when the upstream has no usable price
    async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>>;
}

fn upstream_error(source_name: &'static str, err: impl std::fmt::Display) -> ProxyError {
    ProxyError::Upstream {
        source_name,
        message: err.to_string(),
    }
}

/// Build the HTTP client shared by all sources
pub fn build_http_client(config: &UpstreamConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone())
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(4)
        .tcp_nodelay(true)
        .build()
        .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {e}")))
}

pub struct CoinGeckoSource {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoSource {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "coingecko-proxy"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>> {
        let Some(key) = &self.api_key else {
            return Ok(None);
        };
        let id = coingecko_id(symbol);
        let url = format!("{}/simple/price", self.base_url.trim_end_matches('/'));

        let body: Value = self
            .http
            .get(&url)
            .query(&[("ids", id.as_str()), ("vs_currencies", "usd")])
            .header("X-CG-Pro-API-Key", key)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream_error(self.name(), e))?
            .json()
            .await
            .map_err(|e| upstream_error(self.name(), e))?;

        Ok(body[id.as_str()]["usd"].as_f64().filter(|p| *p != 0.0))
    }
}

#[derive(Debug, Deserialize)]
struct BinanceTicker {
    price: String,
}

pub struct BinanceSource {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BinanceSource {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn name(&self) -> &'static str {
        "binance-proxy"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>> {
        let Some(key) = &self.api_key else {
            return Ok(None);
        };
        let pair = binance_pair(symbol);
        let url = format!("{}/ticker/price", self.base_url.trim_end_matches('/'));

        let ticker: BinanceTicker = self
            .http
            .get(&url)
            .query(&[("symbol", pair.as_str())])
            .header("X-MBX-APIKEY", key)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream_error(self.name(), e))?
            .json()
            .await
            .map_err(|e| upstream_error(self.name(), e))?;

        Ok(ticker.price.parse::<f64>().ok().filter(|p| *p > 0.0))
    }
}

/// Price returned to contracts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: String,
    pub source: String,
    pub timestamp: u64,
    pub symbol: String,
}

/// Tries each configured source in order and returns the first usable price
pub struct FallbackPriceFetcher {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl FallbackPriceFetcher {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self { sources }
    }

    /// CoinGecko first, Binance as fallback
    pub fn from_config(config: &UpstreamConfig, keys: &ApiKeys) -> Result<Self> {
        let http = build_http_client(config)?;
        Ok(Self::new(vec![
            Arc::new(CoinGeckoSource::new(
                http.clone(),
                config.coingecko_url.clone(),
                keys.coingecko.clone(),
            )),
            Arc::new(BinanceSource::new(
                http,
                config.binance_url.clone(),
                keys.binance.clone(),
            )),
        ]))
    }

    pub async fn fetch(&self, symbol: &str) -> Result<PriceQuote> {
        for source in &self.sources {
            if !source.is_configured() {
                debug!(source = source.name(), "skipping source without API key");
                continue;
            }

            match source.fetch_price(symbol).await {
                Ok(Some(price)) => {
                    info!(source = source.name(), symbol, price, "price served");
                    return Ok(PriceQuote {
                        price: price.to_string(),
                        source: source.name().to_string(),
                        timestamp: now_millis(),
                        symbol: symbol.to_ascii_uppercase(),
                    });
                }
                Ok(None) => {
                    warn!(source = source.name(), symbol, "no usable price, trying next source");
                }
                Err(e) => {
                    warn!(source = source.name(), symbol, error = %e, "source failed, trying next source");
                }
            }
        }

        Err(ProxyError::AllSourcesUnavailable {
            message: ALL_FAILED_MESSAGE.to_string(),
        })
    }
}
