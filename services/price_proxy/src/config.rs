//! Proxy configuration
//!
//! Layering, lowest priority first: built-in defaults, an optional TOML file,
//! `PROXY_`-prefixed environment variables (nested keys use `__`, e.g.
//! `PROXY_RATE_LIMIT__MAX_REQUESTS`), then the bare `PORT` and `HOST`
//! variables most hosting platforms inject. Command line flags are applied on
//! top by the binary.

use crate::error::{ProxyError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listen address
    pub host: String,

    /// Listen port
    pub port: u16,

    pub rate_limit: RateLimitConfig,

    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per client per window
    pub max_requests: u32,

    /// Window length in seconds
    pub window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub coingecko_url: String,
    pub binance_url: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            rate_limit: RateLimitConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            binance_url: "https://api.binance.com/api/v3".to_string(),
            timeout_ms: 5000,
            user_agent: "OracleProxy/1.0".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from an optional file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "loading proxy config file");
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("PROXY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ProxyConfig = builder.build()?.try_deserialize()?;
        config.apply_platform_overrides(
            std::env::var("PORT").ok().as_deref(),
            std::env::var("HOST").ok().as_deref(),
        )?;
        Ok(config)
    }

    /// Apply `PORT` / `HOST` values; empty values are ignored
    pub fn apply_platform_overrides(&mut self, port: Option<&str>, host: Option<&str>) -> Result<()> {
        if let Some(port) = port.filter(|p| !p.is_empty()) {
            self.port = port
                .parse()
                .map_err(|e| ProxyError::Configuration(format!("invalid PORT {port:?}: {e}")))?;
        }
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.host = host.to_string();
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ProxyError::Configuration(format!("Invalid bind address: {e}")))
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Upstream API keys; never serialized or logged
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub coingecko: Option<String>,
    pub binance: Option<String>,
}

impl ApiKeys {
    pub fn new(coingecko: Option<String>, binance: Option<String>) -> Self {
        let present = |key: Option<String>| key.filter(|k| !k.trim().is_empty());
        Self {
            coingecko: present(coingecko),
            binance: present(binance),
        }
    }

    /// Read `COINGECKO_API_KEY` and `BINANCE_API_KEY`
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("COINGECKO_API_KEY").ok(),
            std::env::var("BINANCE_API_KEY").ok(),
        )
    }

    pub fn has_coingecko(&self) -> bool {
        self.coingecko.is_some()
    }

    pub fn has_binance(&self) -> bool {
        self.binance.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_coingecko() && !self.has_binance()
    }
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("coingecko", &self.has_coingecko())
            .field("binance", &self.has_binance())
            .finish()
    }
}
