//! Error types for the oracle SDK

use thiserror::Error;

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors reported by a [`ContractClient`](crate::ContractClient) implementation
#[derive(Debug, Error)]
pub enum ClientError {
    /// The node could not be reached or the HTTP exchange failed
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the node
        message: String,
    },

    /// The node answered with something that is not a valid JSON-RPC response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A write was requested but the client has no signing account
    #[error("Client account not available")]
    AccountUnavailable,

    /// The transaction reached a terminal status other than the one awaited
    #[error("transaction {hash} ended with status {status}")]
    TransactionFailed {
        /// Transaction hash
        hash: String,
        /// Terminal status reported by the node
        status: String,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// Main error type for SDK operations
#[derive(Debug, Error)]
pub enum SdkError {
    /// A read or write call to the contract failed. `message` carries the
    /// upstream error text verbatim.
    #[error("{context}: {message}")]
    UpstreamCall {
        /// What the SDK was doing, e.g. "Failed to get oracle status"
        context: &'static str,
        /// Upstream error text
        message: String,
    },

    /// A field of an otherwise well-formed response could not be interpreted
    #[error("invalid {field} value: {value:?}")]
    InvalidValue {
        /// Field that failed to parse
        field: &'static str,
        /// Raw value
        value: String,
    },

    /// A contract address is not a 20-byte hex string
    #[error("invalid contract address: {0}")]
    InvalidAddress(String),

    /// One background poll tick failed. Logged, never returned to callers.
    #[error("poll tick failed: {0}")]
    PollTick(String),

    /// A subscriber failed during fan-out. Logged, never returned to callers.
    #[error(transparent)]
    Callback(#[from] CallbackError),

    /// The SDK instance was destroyed and no longer accepts subscribers
    #[error("SDK instance has been destroyed")]
    Destroyed,

    /// Polling needs a tokio runtime and none is running on this thread
    #[error("no tokio runtime available to drive polling")]
    NoRuntime,
}

impl SdkError {
    pub(crate) fn upstream(context: &'static str, err: impl std::fmt::Display) -> Self {
        SdkError::UpstreamCall {
            context,
            message: err.to_string(),
        }
    }
}

/// Failure of a single subscriber invocation during fan-out
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The subscriber returned an error
    #[error("subscriber #{index} returned an error: {message}")]
    Failed {
        /// Position of the subscriber in the registry
        index: usize,
        /// Rendered error chain
        message: String,
    },

    /// The subscriber panicked
    #[error("subscriber #{index} panicked: {message}")]
    Panicked {
        /// Position of the subscriber in the registry
        index: usize,
        /// Panic payload, when it was a string
        message: String,
    },
}
