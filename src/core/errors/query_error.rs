//! Query error taxonomy shared by the single-target executor and the
//! multi-target aggregation engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while executing a similarity query.
///
/// `execute_single` surfaces all four kinds. `aggregate` folds the last three
/// into its per-target error list and only ever raises `InvalidRequest`.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Message is kept verbatim from the underlying backend failure.
    #[error("{0}")]
    BackendQueryError(String),
}

impl QueryError {
    /// Short machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidRequest(_) => "invalid_request",
            QueryError::TargetNotFound(_) => "target_not_found",
            QueryError::ConnectionError(_) => "connection_error",
            QueryError::BackendQueryError(_) => "backend_query_error",
        }
    }
}
