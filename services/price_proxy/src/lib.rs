//! # Price Proxy
//!
//! Off-chain HTTP service that holds upstream API keys so that oracle
//! contracts can fetch prices without ever seeing a credential.
//!
//! ```text
//! contract ──GET /api/price/ETH──▶ proxy ──(key header)──▶ CoinGecko
//!                                    │                       │ fails
//!                                    │                       ▼
//!                                    └─────(key header)──▶ Binance
//! ```
//!
//! Requests are rate limited per client address with a fixed window. The
//! first configured source that yields a usable price wins; when none does
//! the caller gets a 503.

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod server;
pub mod sources;

pub use config::{ApiKeys, ProxyConfig, RateLimitConfig, UpstreamConfig};
pub use error::{ProxyError, Result};
pub use rate_limit::{FixedWindowLimiter, RateDecision};
pub use server::{handle_rejection, routes, ProxyServer, ProxyState};
pub use sources::{
    binance_pair, coingecko_id, BinanceSource, CoinGeckoSource, FallbackPriceFetcher,
    PriceQuote, PriceSource,
};
