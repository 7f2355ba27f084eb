//! Registry (record store) error types

use thiserror::Error;

/// Failures of the connection/user record store
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),
}

impl RegistryError {
    pub fn connection_not_found(id: impl Into<String>) -> Self {
        RegistryError::NotFound {
            resource: "connection",
            id: id.into(),
        }
    }

    pub fn user_not_found(id: impl Into<String>) -> Self {
        RegistryError::NotFound {
            resource: "user",
            id: id.into(),
        }
    }
}
