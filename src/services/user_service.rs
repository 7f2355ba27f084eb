// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! User Service
//!
//! Account lookup, login and registration on top of a [`UserRegistry`].
//! Passwords are stored as bcrypt hashes; sessions are stateless bearer
//! tokens whose subject is the username.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::security::{AccessToken, PasswordHasher, TokenIssuer};
use crate::core::{AuthError, AuthSettings};
use crate::registry::{UserRecord, UserRegistry};

/// Public view of an account (never carries the hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            full_name: record.full_name.clone(),
            is_admin: record.is_admin,
        }
    }
}

/// Registration input
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

pub struct UserService {
    registry: Arc<dyn UserRegistry>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    settings: AuthSettings,
}

impl UserService {
    pub fn new(registry: Arc<dyn UserRegistry>, settings: &AuthSettings) -> Self {
        Self {
            registry,
            hasher: PasswordHasher::new(settings.bcrypt_cost),
            tokens: TokenIssuer::new(settings),
            settings: settings.clone(),
        }
    }

    /// Create the configured admin account when the store has no users.
    /// Returns the created profile, or `None` when accounts already exist.
    pub async fn bootstrap_admin(&self) -> Result<Option<UserProfile>, AuthError> {
        if !self.registry.list_users().await?.is_empty() {
            return Ok(None);
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: self.settings.bootstrap_admin_username.clone(),
            email: self.settings.bootstrap_admin_email.clone(),
            full_name: Some("Administrator".to_string()),
            hashed_password: self
                .hasher
                .hash(&self.settings.bootstrap_admin_password)
                .await?,
            is_admin: true,
        };
        self.registry.insert_user(record.clone()).await?;

        warn!(
            "⚠️ No users found; bootstrapped admin account '{}'. Change its password.",
            record.username
        );
        Ok(Some(UserProfile::from(&record)))
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserProfile, AuthError> {
        let record = self.registry.find_user_by_username(username).await?;
        let verified = match &record {
            Some(record) => self.hasher.verify(password, &record.hashed_password).await,
            None => false,
        };
        match record {
            Some(record) if verified => {
                debug!("🔓 Authenticated user {}", username);
                Ok(UserProfile::from(&record))
            }
            _ => {
                warn!("🔒 Login failed for {}", username);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Authenticate and issue a bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, AuthError> {
        let user = self.authenticate(username, password).await?;
        let token = self.tokens.issue(&user.username)?;
        info!("✅ Login succeeded for {}", user.username);
        Ok(token)
    }

    /// Register a non-admin account
    pub async fn create_user(&self, input: NewUser) -> Result<UserProfile, AuthError> {
        if input.username.trim().is_empty() || input.password.is_empty() {
            return Err(AuthError::InvalidInput(
                "username and password must not be empty".to_string(),
            ));
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: input.username,
            email: input.email,
            full_name: input.full_name,
            hashed_password: self.hasher.hash(&input.password).await?,
            is_admin: false,
        };
        self.registry.insert_user(record.clone()).await?;

        info!("👤 Registered user {} ({})", record.username, record.id);
        Ok(UserProfile::from(&record))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<UserProfile>, AuthError> {
        Ok(self
            .registry
            .find_user_by_username(username)
            .await?
            .as_ref()
            .map(UserProfile::from))
    }

    /// Map a bearer token to its account. Tokens for deleted accounts are
    /// rejected.
    pub async fn resolve_token(&self, token: &str) -> Result<UserProfile, AuthError> {
        let username = self.tokens.subject(token)?;
        self.get_by_username(&username)
            .await?
            .ok_or_else(|| AuthError::InvalidToken(format!("unknown user '{}'", username)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RegistryError;
    use crate::registry::JsonFileStore;

    fn service() -> UserService {
        let settings = AuthSettings {
            secret_key: "unit-test".to_string(),
            bcrypt_cost: 4,
            ..Default::default()
        };
        UserService::new(Arc::new(JsonFileStore::volatile()), &settings)
    }

    #[tokio::test]
    async fn test_bootstrap_only_once() {
        let service = service();
        let admin = service.bootstrap_admin().await.unwrap().unwrap();
        assert_eq!(admin.username, "admin");
        assert!(admin.is_admin);
        assert!(service.bootstrap_admin().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_and_resolve() {
        let service = service();
        service.bootstrap_admin().await.unwrap();

        let token = service.login("admin", "admin123").await.unwrap();
        let user = service.resolve_token(&token.access_token).await.unwrap();
        assert_eq!(user.username, "admin");

        assert!(matches!(
            service.login("admin", "nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("ghost", "admin123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_create_user_is_not_admin_and_unique() {
        let service = service();
        let input = NewUser {
            username: "bob".to_string(),
            password: "pw".to_string(),
            email: None,
            full_name: Some("Bob".to_string()),
        };
        let bob = service.create_user(input.clone()).await.unwrap();
        assert!(!bob.is_admin);

        let err = service.create_user(input).await.unwrap_err();
        assert!(matches!(err, AuthError::Registry(RegistryError::Conflict(_))));
        assert!(service.authenticate("bob", "pw").await.is_ok());
    }
}
