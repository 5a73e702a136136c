//! Error types for the provider client layer.

use thiserror::Error;

/// Errors that can occur while calling a vision model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Transport-level failure (connection, TLS, timeout).
    #[cfg(feature = "native")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure reported by the host environment (browser `fetch`).
    #[error("request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider status string (e.g. `NOT_FOUND`), when present.
        code: Option<String>,
        /// Provider error message, or the raw body if it was not JSON.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl InferenceError {
    /// HTTP status of a provider error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Provider status string of a provider error, if present.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
