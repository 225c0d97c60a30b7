//! Error types for the price proxy

use thiserror::Error;
use warp::http::StatusCode;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Client exceeded its request quota for the current window
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Every configured price source failed or none is configured
    #[error("All price sources unavailable")]
    AllSourcesUnavailable { message: String },

    /// One upstream request failed; the fallback chain moves on
    #[error("{source_name} request failed: {message}")]
    Upstream {
        source_name: &'static str,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Proxy error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::AllSourcesUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream { .. }
            | ProxyError::Configuration(_)
            | ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to the client
    pub fn body(&self) -> serde_json::Value {
        match self {
            ProxyError::RateLimitExceeded { retry_after_secs } => serde_json::json!({
                "error": "Rate limit exceeded",
                "retryAfter": retry_after_secs,
            }),
            ProxyError::AllSourcesUnavailable { message } => serde_json::json!({
                "error": "All price sources unavailable",
                "message": message,
            }),
            other => serde_json::json!({
                "error": "Proxy error",
                "message": other.to_string(),
            }),
        }
    }
}

impl warp::reject::Reject for ProxyError {}

impl From<config::ConfigError> for ProxyError {
    fn from(err: config::ConfigError) -> Self {
        ProxyError::Configuration(err.to_string())
    }
}
