//! Client error types

use thiserror::Error;

/// Connection-level failure below HTTP status handling
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the host
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Anything else the HTTP stack reported
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Errors surfaced by [`crate::RateLimitedClient`]
///
/// Non-success statuses other than rate limiting are *not* errors; they come
/// back as an [`crate::ApiResponse`] for the caller to judge.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failed before a status was received
    #[error("{action}: {source}")]
    Transport {
        /// Human-readable action description
        action: String,
        /// Underlying failure
        #[source]
        source: TransportError,
    },

    /// Still rate limited after every permitted retry
    #[error("{action}: still rate limited after {attempts} attempts")]
    RateLimitExhausted {
        /// Human-readable action description
        action: String,
        /// Attempts made, including the first
        attempts: u32,
    },

    /// Cancellation token fired while waiting
    #[error("request cancelled")]
    Cancelled,

    /// Request body could not be encoded
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// Response body did not match the expected shape
    #[error("failed to decode response for {path}: {reason}")]
    Decode {
        /// Request path
        path: String,
        /// Decoder message
        reason: String,
    },

    /// Client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl ClientError {
    /// Whether this came from the rate limiter giving up
    #[inline]
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExhausted { .. })
    }
}
