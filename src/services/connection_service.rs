// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Connection Service - registry CRUD plus live-session management
//!
//! Owns the [`SessionPool`] shared by the management API and the query
//! executor. A connection id has at most one live session; connecting an
//! already-live id is a no-op detected by alias existence in the pool.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{BackendConnector, BackendSession, Endpoint, SessionPool};
use crate::core::{BackendError, QueryError, RegistryError};
use crate::registry::{
    ConnectionPatch, ConnectionRecord, ConnectionRegistry, ConnectionStatus, RegistryResult,
};

/// Input for registering a connection
#[derive(Debug, Clone, Deserialize)]
pub struct NewConnection {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    pub message: String,
}

/// Outcome of a connect or disconnect request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatusReport {
    pub id: String,
    pub status: ConnectionStatus,
    pub details: StatusDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Created,
    NotCreated,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub entity_count: u64,
    pub index_status: IndexStatus,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatistics {
    pub collection_count: usize,
    pub total_entities: u64,
    pub collections: Vec<CollectionStats>,
}

pub struct ConnectionService {
    registry: Arc<dyn ConnectionRegistry>,
    connector: Arc<dyn BackendConnector>,
    sessions: SessionPool,
}

impl ConnectionService {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, connector: Arc<dyn BackendConnector>) -> Self {
        Self {
            registry,
            connector,
            sessions: SessionPool::new(),
        }
    }

    pub fn sessions(&self) -> &SessionPool {
        &self.sessions
    }

    pub async fn list(&self) -> RegistryResult<Vec<ConnectionRecord>> {
        self.registry.list_connections().await
    }

    pub async fn get(&self, id: &str) -> RegistryResult<ConnectionRecord> {
        self.registry
            .lookup(id)
            .await?
            .ok_or_else(|| RegistryError::connection_not_found(id))
    }

    /// Resolve a target for the query path. `Ok(None)` means unknown id.
    pub async fn lookup(&self, id: &str) -> RegistryResult<Option<ConnectionRecord>> {
        self.registry.lookup(id).await
    }

    pub async fn create(&self, input: NewConnection, created_by: &str) -> RegistryResult<ConnectionRecord> {
        info!("🆕 Registering connection: {} ({}:{})", input.name, input.host, input.port);

        let record = ConnectionRecord {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            host: input.host,
            port: input.port,
            username: input.username,
            password: input.password,
            description: input.description,
            status: ConnectionStatus::Disconnected,
            created_by: created_by.to_string(),
        };
        self.registry.insert_connection(record.clone()).await?;

        info!("✅ Connection registered: {} (ID: {})", record.name, record.id);
        Ok(record)
    }

    pub async fn update(&self, id: &str, patch: ConnectionPatch) -> RegistryResult<ConnectionRecord> {
        let update = self.registry.update_connection(id, patch).await?;
        if update.endpoint_changed && self.drop_session(id).await {
            info!("🔌 Endpoint of {} changed, live session dropped", id);
        }
        debug!("📝 Connection {} updated", id);
        Ok(update.record)
    }

    pub async fn delete(&self, id: &str) -> RegistryResult<()> {
        info!("🗑️ Deleting connection: {}", id);
        if !self.registry.delete(id).await? {
            return Err(RegistryError::connection_not_found(id));
        }
        self.drop_session(id).await;
        Ok(())
    }

    /// Connect and report the outcome. A backend failure is reported in the
    /// returned status, not raised.
    pub async fn connect(&self, id: &str) -> RegistryResult<ConnectionStatusReport> {
        let record = self.get(id).await?;
        let already_live = self.sessions.contains(id);

        let report = match self.ensure_connected(&record).await {
            Ok(_) => ConnectionStatusReport {
                id: id.to_string(),
                status: ConnectionStatus::Connected,
                details: StatusDetails {
                    message: if already_live {
                        "Already connected".to_string()
                    } else {
                        "Connected successfully".to_string()
                    },
                },
            },
            Err(e) => ConnectionStatusReport {
                id: id.to_string(),
                status: ConnectionStatus::Failed,
                details: StatusDetails {
                    message: e.to_string(),
                },
            },
        };
        Ok(report)
    }

    pub async fn disconnect(&self, id: &str) -> RegistryResult<ConnectionStatusReport> {
        self.get(id).await?;
        self.drop_session(id).await;
        self.registry
            .set_status(id, ConnectionStatus::Disconnected)
            .await?;

        info!("🔌 Disconnected {}", SessionPool::alias(id));
        Ok(ConnectionStatusReport {
            id: id.to_string(),
            status: ConnectionStatus::Disconnected,
            details: StatusDetails {
                message: "Disconnected".to_string(),
            },
        })
    }

    /// Collection counts and index state. A collection whose statistics
    /// cannot be read is reported with `unknown` status instead of failing
    /// the call.
    pub async fn statistics(&self, id: &str) -> Result<DatabaseStatistics, QueryError> {
        let record = self
            .lookup(id)
            .await
            .map_err(|e| QueryError::ConnectionError(e.to_string()))?
            .ok_or_else(|| QueryError::TargetNotFound(id.to_string()))?;

        let session = self
            .ensure_connected(&record)
            .await
            .map_err(|e| QueryError::ConnectionError(e.to_string()))?;

        let start_time = Instant::now();
        let names = session
            .list_collections()
            .await
            .map_err(|e| QueryError::BackendQueryError(e.to_string()))?;

        let mut collections = Vec::with_capacity(names.len());
        let mut total_entities = 0;
        for name in &names {
            match session.collection_info(name).await {
                Ok(info) => {
                    total_entities += info.entity_count;
                    collections.push(CollectionStats {
                        name: info.name,
                        entity_count: info.entity_count,
                        index_status: if info.has_index {
                            IndexStatus::Created
                        } else {
                            IndexStatus::NotCreated
                        },
                        description: String::new(),
                    });
                }
                Err(e) => {
                    warn!("⚠️ Could not read statistics of {}/{}: {}", id, name, e);
                    collections.push(CollectionStats {
                        name: name.clone(),
                        entity_count: 0,
                        index_status: IndexStatus::Unknown,
                        description: format!("error: {}", e),
                    });
                }
            }
        }

        debug!(
            "📊 Statistics for {}: {} collections, {} entities in {}μs",
            id,
            names.len(),
            total_entities,
            start_time.elapsed().as_micros()
        );
        Ok(DatabaseStatistics {
            collection_count: names.len(),
            total_entities,
            collections,
        })
    }

    /// Return the live session for `record`, connecting when there is none.
    /// The observed outcome is written back as the record's status.
    pub async fn ensure_connected(
        &self,
        record: &ConnectionRecord,
    ) -> Result<Arc<dyn BackendSession>, BackendError> {
        if let Some(session) = self.sessions.get(&record.id) {
            return Ok(session);
        }

        let endpoint = Endpoint::from(record);
        match self.connector.connect(&endpoint).await {
            Ok(session) => {
                let session = self.sessions.insert(&record.id, session);
                info!(
                    "🔌 {} connected to {} ({})",
                    SessionPool::alias(&record.id),
                    endpoint.address(),
                    self.connector.backend_name()
                );
                self.record_status(record, ConnectionStatus::Connected).await;
                Ok(session)
            }
            Err(e) => {
                warn!("❌ Connecting {} failed: {}", SessionPool::alias(&record.id), e);
                self.record_status(record, ConnectionStatus::Failed).await;
                Err(e)
            }
        }
    }

    async fn drop_session(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some(session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    /// Status bookkeeping never fails the caller's operation
    async fn record_status(&self, record: &ConnectionRecord, status: ConnectionStatus) {
        if record.status == status {
            return;
        }
        if let Err(e) = self.registry.set_status(&record.id, status).await {
            warn!("⚠️ Could not record status {} for {}: {}", status, record.id, e);
        }
    }
}
