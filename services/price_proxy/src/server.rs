//! HTTP routes and server lifecycle

use crate::config::{ApiKeys, ProxyConfig};
use crate::error::{ProxyError, Result};
use crate::rate_limit::{FixedWindowLimiter, RateDecision};
use crate::sources::{now_millis, FallbackPriceFetcher};
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, error, info};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// State shared by all request handlers
pub struct ProxyState {
    pub limiter: FixedWindowLimiter,
    pub fetcher: FallbackPriceFetcher,
    pub keys: ApiKeys,
}

impl ProxyState {
    pub fn new(limiter: FixedWindowLimiter, fetcher: FallbackPriceFetcher, keys: ApiKeys) -> Self {
        Self {
            limiter,
            fetcher,
            keys,
        }
    }

    pub fn from_config(config: &ProxyConfig, keys: ApiKeys) -> Result<Self> {
        let limiter = FixedWindowLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window(),
        );
        let fetcher = FallbackPriceFetcher::from_config(&config.upstream, &keys)?;
        Ok(Self::new(limiter, fetcher, keys))
    }
}

fn with_state(
    state: Arc<ProxyState>,
) -> impl Filter<Extract = (Arc<ProxyState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Rejects the request once the caller's quota for the window is used up
fn rate_limited(
    state: Arc<ProxyState>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::addr::remote()
        .and(with_state(state))
        .and_then(|remote: Option<SocketAddr>, state: Arc<ProxyState>| async move {
            let client = remote
                .map(|addr| addr.ip())
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
            match state.limiter.check(client) {
                RateDecision::Allowed { count } => {
                    debug!(%client, count, "request admitted");
                    Ok(())
                }
                RateDecision::Limited { retry_after_secs } => Err(warp::reject::custom(
                    ProxyError::RateLimitExceeded { retry_after_secs },
                )),
            }
        })
        .untuple_one()
}

/// All proxy routes with rate limiting and error mapping applied
pub fn routes(
    state: Arc<ProxyState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<ProxyState>| {
            warp::reply::json(&serde_json::json!({
                "status": "ok",
                "timestamp": now_millis(),
                "hasCoingeckoKey": state.keys.has_coingecko(),
                "hasBinanceKey": state.keys.has_binance(),
            }))
        });

    let price = warp::path!("api" / "price" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(price_handler);

    rate_limited(state)
        .and(health.or(price))
        .recover(handle_rejection)
}

async fn price_handler(
    symbol: String,
    state: Arc<ProxyState>,
) -> std::result::Result<warp::reply::Json, Rejection> {
    state
        .fetcher
        .fetch(&symbol)
        .await
        .map(|quote| warp::reply::json(&quote))
        .map_err(warp::reject::custom)
}

/// Map rejections to JSON error bodies
pub async fn handle_rejection(
    err: Rejection,
) -> std::result::Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    let (status, body) = if let Some(proxy_err) = err.find::<ProxyError>() {
        if proxy_err.status_code().is_server_error() {
            error!(error = %proxy_err, "request failed");
        }
        (proxy_err.status_code(), proxy_err.body())
    } else if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Not found" }),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            serde_json::json!({ "error": "Method not allowed" }),
        )
    } else {
        let internal = ProxyError::Internal(format!("{err:?}"));
        error!(error = %internal, "unhandled rejection");
        (internal.status_code(), internal.body())
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

/// Price proxy HTTP server
pub struct ProxyServer {
    config: ProxyConfig,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig, keys: ApiKeys) -> Result<Self> {
        let state = Arc::new(ProxyState::from_config(&config, keys)?);
        Ok(Self { config, state })
    }

    /// Serve until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = self.config.socket_addr()?;

        let (bound, server) = warp::serve(routes(self.state.clone()))
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| ProxyError::Internal(format!("failed to bind {addr}: {e}")))?;

        info!(
            %bound,
            max_requests = self.state.limiter.max_requests(),
            window_secs = self.state.limiter.window().as_secs(),
            "price proxy listening"
        );
        info!("health check: http://{bound}/health");
        info!("price endpoint: http://{bound}/api/price/ETH");

        let purge = self.spawn_purge_task();
        server.await;
        purge.abort();

        info!("price proxy stopped");
        Ok(())
    }

    /// Periodically drop rate limit counters for idle clients
    fn spawn_purge_task(&self) -> tokio::task::JoinHandle<()> {
        let state = self.state.clone();
        let period = self.state.limiter.window().max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = state.limiter.purge_expired(Instant::now());
                if purged > 0 {
                    debug!(purged, remaining = state.limiter.tracked_clients(), "purged idle clients");
                }
            }
        })
    }
}
