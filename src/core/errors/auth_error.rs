//! Authentication and authorization errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Could not validate credentials: {0}")]
    InvalidToken(String),

    #[error("Invalid account data: {0}")]
    InvalidInput(String),

    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Password hashing task failed: {0}")]
    HashingTask(#[from] tokio::task::JoinError),

    #[error("Token encoding failed: {0}")]
    TokenEncoding(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Registry(#[from] super::RegistryError),
}
