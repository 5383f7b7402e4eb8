//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to
//! build meaningful log entries.

use thiserror::Error;

/// Errors that can occur while querying a completion provider.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the provider endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed {
        endpoint: String,
        reason: String,
    },

    /// The provider did not respond within its configured timeout.
    #[error("{provider} timed out after {duration_secs}s")]
    Timeout {
        provider: String,
        duration_secs: u64,
    },

    /// Non-2xx HTTP response from the provider endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError {
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse {
        provider: String,
        reason: String,
    },

    /// The provider answered with nothing usable.
    #[error("{provider} returned an empty answer")]
    EmptyResponse {
        provider: String,
    },

    /// Every provider in the fallback chain failed or none is configured.
    #[error("all providers unavailable (tried: {})", attempted.join(", "))]
    AllProvidersFailed {
        attempted: Vec<String>,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

impl InferenceError {
    /// Extract the error body text, if this is an `HttpError`.
    pub fn error_body(&self) -> Option<&str> {
        match self {
            InferenceError::HttpError { body, .. } => Some(body),
            _ => None,
        }
    }
}
