// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! JSON document registry backend
//!
//! ## File layout:
//! ```text
//! {
//!     "users": [ { "id": ..., "username": ..., "hashed_password": ..., ... } ],
//!     "database_connections": [ { "id": ..., "name": ..., "host": ..., ... } ]
//! }
//! ```
//!
//! The whole document is cached in memory. Every mutation is applied to a
//! copy, written to `<file>.tmp`, renamed over the original and only then
//! published to the cache, so readers in this process never observe a write
//! that did not reach disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    ConnectionPatch, ConnectionRecord, ConnectionRegistry, ConnectionStatus, ConnectionUpdate,
    RegistryResult, UserRecord, UserRegistry,
};
use crate::core::RegistryError;

/// On-disk document shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub database_connections: Vec<ConnectionRecord>,
}

/// Registry backed by a single JSON file
pub struct JsonFileStore {
    /// `None` keeps the document in memory only
    path: Option<PathBuf>,
    document: RwLock<StoreDocument>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref().to_path_buf();

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => StoreDocument::default(),
            Ok(bytes) => serde_json::from_slice::<StoreDocument>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📁 Registry file {:?} not found, starting empty", path);
                StoreDocument::default()
            }
            Err(e) => return Err(RegistryError::Io(e)),
        };

        debug!(
            "📋 Registry loaded from {:?}: {} users, {} connections",
            path,
            document.users.len(),
            document.database_connections.len()
        );

        Ok(Self {
            path: Some(path),
            document: RwLock::new(document),
        })
    }

    /// In-memory store with no file behind it
    pub fn volatile() -> Self {
        Self {
            path: None,
            document: RwLock::new(StoreDocument::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the full document
    pub async fn snapshot(&self) -> StoreDocument {
        self.document.read().await.clone()
    }

    /// Apply `mutate` to a copy of the document, persist it, then publish it.
    async fn write_with<T, F>(&self, mutate: F) -> RegistryResult<T>
    where
        F: FnOnce(&mut StoreDocument) -> RegistryResult<T>,
    {
        let mut guard = self.document.write().await;
        let mut next = guard.clone();
        let outcome = mutate(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(outcome)
    }

    async fn persist(&self, document: &StoreDocument) -> RegistryResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(document)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!("💾 Registry persisted to {:?} ({} bytes)", path, bytes.len());
        Ok(())
    }
}

#[async_trait]
impl ConnectionRegistry for JsonFileStore {
    async fn list_connections(&self) -> RegistryResult<Vec<ConnectionRecord>> {
        Ok(self.document.read().await.database_connections.clone())
    }

    async fn lookup(&self, id: &str) -> RegistryResult<Option<ConnectionRecord>> {
        Ok(self
            .document
            .read()
            .await
            .database_connections
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_by_name(&self, name: &str) -> RegistryResult<Option<ConnectionRecord>> {
        Ok(self
            .document
            .read()
            .await
            .database_connections
            .iter()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn upsert(&self, record: ConnectionRecord) -> RegistryResult<()> {
        self.write_with(move |doc| {
            match doc.database_connections.iter_mut().find(|c| c.id == record.id) {
                Some(existing) => *existing = record,
                None => doc.database_connections.push(record),
            }
            Ok(())
        })
        .await
    }

    async fn insert_connection(&self, record: ConnectionRecord) -> RegistryResult<()> {
        self.write_with(move |doc| {
            if doc.database_connections.iter().any(|c| c.name == record.name) {
                return Err(name_taken(&record.name));
            }
            doc.database_connections.push(record);
            Ok(())
        })
        .await
    }

    async fn update_connection(
        &self,
        id: &str,
        patch: ConnectionPatch,
    ) -> RegistryResult<ConnectionUpdate> {
        self.write_with(move |doc| {
            if let Some(name) = &patch.name {
                if doc
                    .database_connections
                    .iter()
                    .any(|c| c.id != id && &c.name == name)
                {
                    return Err(name_taken(name));
                }
            }
            let record = doc
                .database_connections
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| RegistryError::connection_not_found(id))?;
            let endpoint_changed = patch.apply(record);
            Ok(ConnectionUpdate {
                record: record.clone(),
                endpoint_changed,
            })
        })
        .await
    }

    async fn delete(&self, id: &str) -> RegistryResult<bool> {
        {
            let doc = self.document.read().await;
            if !doc.database_connections.iter().any(|c| c.id == id) {
                return Ok(false);
            }
        }
        self.write_with(|doc| {
            let before = doc.database_connections.len();
            doc.database_connections.retain(|c| c.id != id);
            Ok(doc.database_connections.len() < before)
        })
        .await
    }

    async fn set_status(&self, id: &str, status: ConnectionStatus) -> RegistryResult<()> {
        self.write_with(|doc| {
            let record = doc
                .database_connections
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| RegistryError::connection_not_found(id))?;
            record.status = status;
            Ok(())
        })
        .await
    }
}

fn name_taken(name: &str) -> RegistryError {
    RegistryError::Conflict(format!("Connection name '{}' already exists", name))
}

#[async_trait]
impl UserRegistry for JsonFileStore {
    async fn list_users(&self) -> RegistryResult<Vec<UserRecord>> {
        Ok(self.document.read().await.users.clone())
    }

    async fn find_user_by_username(&self, username: &str) -> RegistryResult<Option<UserRecord>> {
        Ok(self
            .document
            .read()
            .await
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> RegistryResult<Option<UserRecord>> {
        Ok(self
            .document
            .read()
            .await
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn insert_user(&self, user: UserRecord) -> RegistryResult<()> {
        self.write_with(move |doc| {
            if doc.users.iter().any(|u| u.username == user.username) {
                return Err(RegistryError::Conflict(format!(
                    "Username '{}' already exists",
                    user.username
                )));
            }
            doc.users.push(user);
            Ok(())
        })
        .await
    }
}
