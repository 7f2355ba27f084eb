/*
 * Copyright 2025 Vijaykumar Singh
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Connection Registry
//!
//! Named connection descriptors (host, port, credentials, status) and user
//! accounts. The aggregation engine only needs `lookup` and `set_status`; the
//! management API uses the rest.
//!
//! Backends:
//! - [`JsonFileStore`] - one JSON document holding both record arrays
//!   (optionally volatile, for tests and development)

pub mod file_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::RegistryError;

pub use file_store::JsonFileStore;

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Liveness of a connection as last observed by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A registered external vector-database connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ConnectionStatus,
    pub created_by: String,
}

/// Partial update of a connection; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionPatch {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub description: Option<String>,
}

impl ConnectionPatch {
    /// Apply to `record`. Returns true when host, port or credentials
    /// changed, in which case the status is reset to `Disconnected`.
    pub fn apply(self, record: &mut ConnectionRecord) -> bool {
        let before = (
            record.host.clone(),
            record.port,
            record.username.clone(),
            record.password.clone(),
        );

        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(host) = self.host {
            record.host = host;
        }
        if let Some(port) = self.port {
            record.port = port;
        }
        if let Some(username) = self.username {
            record.username = Some(username);
        }
        if let Some(password) = self.password {
            record.password = Some(password);
        }
        if let Some(description) = self.description {
            record.description = Some(description);
        }

        let endpoint_changed = before
            != (
                record.host.clone(),
                record.port,
                record.username.clone(),
                record.password.clone(),
            );
        if endpoint_changed {
            record.status = ConnectionStatus::Disconnected;
        }
        endpoint_changed
    }
}

/// Result of [`ConnectionRegistry::update_connection`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionUpdate {
    pub record: ConnectionRecord,
    pub endpoint_changed: bool,
}

/// A user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub hashed_password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Store of connection descriptors
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    async fn list_connections(&self) -> RegistryResult<Vec<ConnectionRecord>>;

    async fn lookup(&self, id: &str) -> RegistryResult<Option<ConnectionRecord>>;

    async fn find_by_name(&self, name: &str) -> RegistryResult<Option<ConnectionRecord>>;

    /// Insert, or replace the record with the same id
    async fn upsert(&self, record: ConnectionRecord) -> RegistryResult<()>;

    /// Fails with `Conflict` when the name is taken. The check and the write
    /// happen under one lock.
    async fn insert_connection(&self, record: ConnectionRecord) -> RegistryResult<()>;

    /// Patch the record in place. Fails with `NotFound` when the id is gone
    /// and `Conflict` when another record holds the new name.
    async fn update_connection(
        &self,
        id: &str,
        patch: ConnectionPatch,
    ) -> RegistryResult<ConnectionUpdate>;

    /// Returns false when no record had this id
    async fn delete(&self, id: &str) -> RegistryResult<bool>;

    async fn set_status(&self, id: &str, status: ConnectionStatus) -> RegistryResult<()>;
}

/// Store of user accounts
#[async_trait]
pub trait UserRegistry: Send + Sync {
    async fn list_users(&self) -> RegistryResult<Vec<UserRecord>>;

    async fn find_user_by_username(&self, username: &str) -> RegistryResult<Option<UserRecord>>;

    async fn find_user_by_id(&self, id: &str) -> RegistryResult<Option<UserRecord>>;

    /// Fails with `Conflict` when the username is taken
    async fn insert_user(&self, user: UserRecord) -> RegistryResult<()>;
}
