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

//! Backend client adapters for external vector databases
//!
//! A [`BackendConnector`] turns an [`Endpoint`] into a live
//! [`BackendSession`]. Sessions are shared per connection id through the
//! [`SessionPool`]; everything heavy (indexing, distance computation) happens
//! inside the external service.

pub mod memory;
pub mod milvus;
pub mod sessions;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::{BackendError, FieldMap, HitId, SearchParams};
use crate::registry::ConnectionRecord;

pub use memory::InMemoryConnector;
pub use milvus::MilvusConnector;
pub use sessions::SessionPool;

/// Network location and credentials of one external cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().map_or(false, |u| !u.is_empty())
    }
}

impl From<&ConnectionRecord> for Endpoint {
    fn from(record: &ConnectionRecord) -> Self {
        Self {
            host: record.host.clone(),
            port: record.port,
            username: record.username.clone(),
            password: record.password.clone(),
        }
    }
}

/// A hit as returned by the backend, before output-field selection
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: HitId,
    pub distance: f32,
    /// Entity payload; may be empty
    pub entity: FieldMap,
}

impl RawHit {
    pub fn new(id: impl Into<HitId>, distance: f32) -> Self {
        Self {
            id: id.into(),
            distance,
            entity: FieldMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.entity.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.entity.get(name)
    }
}

/// Statistics for one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub entity_count: u64,
    pub has_index: bool,
}

/// Arguments of a single-collection similarity search
#[derive(Debug, Clone, Copy)]
pub struct BackendSearch<'a> {
    pub collection_name: &'a str,
    /// Already normalized to a batch
    pub vectors: &'a [Vec<f32>],
    pub limit: usize,
    pub params: &'a SearchParams,
    pub output_fields: &'a [String],
}

/// A live session to one external cluster
#[async_trait]
pub trait BackendSession: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    async fn list_collections(&self) -> Result<Vec<String>, BackendError>;

    async fn collection_info(&self, collection_name: &str) -> Result<CollectionInfo, BackendError>;

    /// One ordered hit group per query vector, each sorted ascending by
    /// distance
    async fn search(&self, request: BackendSearch<'_>) -> Result<Vec<Vec<RawHit>>, BackendError>;

    /// Release backend-side resources. Stateless protocols have nothing to do.
    async fn close(&self) {}
}

/// Opens sessions against an external vector database product
#[async_trait]
pub trait BackendConnector: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Establish and verify a session
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn BackendSession>, BackendError>;
}
