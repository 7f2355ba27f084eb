//! Errors raised by backend client adapters

use thiserror::Error;

/// Failure talking to an external vector database
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned code {code}: {message}")]
    Api { code: i64, message: String },

    #[error("unexpected backend response: {0}")]
    Decode(String),
}
