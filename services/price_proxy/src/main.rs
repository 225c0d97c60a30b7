//! Price proxy entry point

use anyhow::Context;
use clap::Parser;
use price_proxy::{ApiKeys, ProxyConfig, ProxyServer};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides config and HOST
    #[arg(long)]
    host: Option<String>,

    /// Port, overrides config and PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Requests allowed per client per window
    #[arg(long)]
    max_requests: Option<u32>,

    /// Rate limit window in seconds
    #[arg(long)]
    window_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_proxy=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting price proxy");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ProxyConfig::load(args.config.as_deref()).context("Failed to load proxy configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(max_requests) = args.max_requests {
        config.rate_limit.max_requests = max_requests;
    }
    if let Some(window_secs) = args.window_secs {
        config.rate_limit.window_secs = window_secs;
    }
    info!(?config, "configuration loaded");

    let keys = ApiKeys::from_env();
    if keys.is_empty() {
        warn!("No API keys configured; every price request will return 503");
        warn!("Set COINGECKO_API_KEY or BINANCE_API_KEY");
    } else {
        info!(
            coingecko = keys.has_coingecko(),
            binance = keys.has_binance(),
            "API keys loaded"
        );
    }

    let server = ProxyServer::new(config, keys).context("Failed to initialise proxy")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    server.run(shutdown).await.context("Price proxy failed")?;
    Ok(())
}
