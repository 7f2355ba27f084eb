// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! In-Memory Scripted Backend
//!
//! In-process stand-in for an external vector database, for tests and local
//! development. Each cluster (keyed by `host:port`) holds collections with a
//! preset, already-sorted hit list that is answered for every query vector.
//! Connect refusals, search failures and latency can be injected, and every
//! search call is recorded for inspection.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use super::{BackendConnector, BackendSearch, BackendSession, CollectionInfo, Endpoint, RawHit};
use crate::core::{BackendError, SearchParams};

/// Error code used for an unknown collection, mirroring Milvus
pub const COLLECTION_NOT_FOUND_CODE: i64 = 100;

#[derive(Debug, Clone, Default)]
struct ScriptedCollection {
    hits: Vec<RawHit>,
    entity_count: u64,
    has_index: bool,
    search_error: Option<String>,
    stats_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct ScriptedCluster {
    collections: BTreeMap<String, ScriptedCollection>,
    refuse_connections: bool,
    search_delay: Option<Duration>,
}

/// A search call as seen by the scripted backend
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSearch {
    pub address: String,
    pub collection_name: String,
    pub vectors: Vec<Vec<f32>>,
    pub limit: usize,
    pub params: SearchParams,
    pub output_fields: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    clusters: HashMap<String, ScriptedCluster>,
    connect_count: usize,
    searches: Vec<RecordedSearch>,
}

/// Connector whose sessions answer from scripted data
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `host:port` reachable with no collections
    pub fn add_cluster(&self, host: &str, port: u16) {
        let mut state = self.state.lock();
        state
            .clusters
            .entry(address(host, port))
            .or_default();
    }

    /// Add (or replace) a collection answering `hits` for every query vector
    pub fn add_collection(&self, host: &str, port: u16, collection_name: &str, hits: Vec<RawHit>) {
        let mut state = self.state.lock();
        let cluster = state.clusters.entry(address(host, port)).or_default();
        let entity_count = hits.len() as u64;
        cluster.collections.insert(
            collection_name.to_string(),
            ScriptedCollection {
                hits,
                entity_count,
                has_index: true,
                ..Default::default()
            },
        );
    }

    pub fn set_index(&self, host: &str, port: u16, collection_name: &str, has_index: bool) {
        self.with_collection(host, port, collection_name, |c| c.has_index = has_index);
    }

    pub fn fail_search(&self, host: &str, port: u16, collection_name: &str, message: &str) {
        let message = message.to_string();
        self.with_collection(host, port, collection_name, |c| {
            c.search_error = Some(message)
        });
    }

    pub fn fail_stats(&self, host: &str, port: u16, collection_name: &str, message: &str) {
        let message = message.to_string();
        self.with_collection(host, port, collection_name, |c| {
            c.stats_error = Some(message)
        });
    }

    pub fn refuse_connections(&self, host: &str, port: u16) {
        let mut state = self.state.lock();
        state
            .clusters
            .entry(address(host, port))
            .or_default()
            .refuse_connections = true;
    }

    pub fn set_search_delay(&self, host: &str, port: u16, delay: Duration) {
        let mut state = self.state.lock();
        state
            .clusters
            .entry(address(host, port))
            .or_default()
            .search_delay = Some(delay);
    }

    /// Number of sessions opened so far
    pub fn connect_count(&self) -> usize {
        self.state.lock().connect_count
    }

    pub fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.state.lock().searches.clone()
    }

    fn with_collection<F>(&self, host: &str, port: u16, collection_name: &str, apply: F)
    where
        F: FnOnce(&mut ScriptedCollection),
    {
        let mut state = self.state.lock();
        let collection = state
            .clusters
            .entry(address(host, port))
            .or_default()
            .collections
            .entry(collection_name.to_string())
            .or_default();
        apply(collection);
    }
}

fn address(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

#[async_trait]
impl BackendConnector for InMemoryConnector {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn BackendSession>, BackendError> {
        let mut state = self.state.lock();
        let reachable = state
            .clusters
            .get(&endpoint.address())
            .map_or(false, |cluster| !cluster.refuse_connections);
        if !reachable {
            return Err(BackendError::Connect {
                endpoint: endpoint.address(),
                reason: "connection refused".to_string(),
            });
        }

        state.connect_count += 1;
        Ok(Arc::new(InMemorySession {
            state: self.state.clone(),
            endpoint: endpoint.clone(),
        }))
    }
}

struct InMemorySession {
    state: Arc<Mutex<MemoryState>>,
    endpoint: Endpoint,
}

impl InMemorySession {
    fn cluster(&self, state: &MemoryState) -> Result<ScriptedCluster, BackendError> {
        state
            .clusters
            .get(&self.endpoint.address())
            .cloned()
            .ok_or_else(|| BackendError::Connect {
                endpoint: self.endpoint.address(),
                reason: "cluster went away".to_string(),
            })
    }
}

fn collection_not_found(name: &str) -> BackendError {
    BackendError::Api {
        code: COLLECTION_NOT_FOUND_CODE,
        message: format!("collection not found[collection={}]", name),
    }
}

#[async_trait]
impl BackendSession for InMemorySession {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn list_collections(&self) -> Result<Vec<String>, BackendError> {
        let state = self.state.lock();
        let cluster = self.cluster(&state)?;
        Ok(cluster.collections.keys().cloned().collect())
    }

    async fn collection_info(&self, collection_name: &str) -> Result<CollectionInfo, BackendError> {
        let state = self.state.lock();
        let cluster = self.cluster(&state)?;
        let collection = cluster
            .collections
            .get(collection_name)
            .ok_or_else(|| collection_not_found(collection_name))?;

        if let Some(message) = &collection.stats_error {
            return Err(BackendError::Api {
                code: 1,
                message: message.clone(),
            });
        }

        Ok(CollectionInfo {
            name: collection_name.to_string(),
            entity_count: collection.entity_count,
            has_index: collection.has_index,
        })
    }

    async fn search(&self, request: BackendSearch<'_>) -> Result<Vec<Vec<RawHit>>, BackendError> {
        let (cluster, collection) = {
            let mut state = self.state.lock();
            state.searches.push(RecordedSearch {
                address: self.endpoint.address(),
                collection_name: request.collection_name.to_string(),
                vectors: request.vectors.to_vec(),
                limit: request.limit,
                params: request.params.clone(),
                output_fields: request.output_fields.to_vec(),
            });
            let cluster = self.cluster(&state)?;
            let collection = cluster.collections.get(request.collection_name).cloned();
            (cluster, collection)
        };

        if let Some(delay) = cluster.search_delay {
            tokio::time::sleep(delay).await;
        }

        let collection = collection.ok_or_else(|| collection_not_found(request.collection_name))?;
        if let Some(message) = collection.search_error {
            return Err(BackendError::Api {
                code: 65535,
                message,
            });
        }

        let group: Vec<RawHit> = collection.hits.into_iter().take(request.limit).collect();
        Ok(request.vectors.iter().map(|_| group.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_answers_per_query_vector() {
        let connector = InMemoryConnector::new();
        connector.add_collection(
            "h",
            1,
            "docs",
            vec![RawHit::new(1, 0.1), RawHit::new(2, 0.2), RawHit::new(3, 0.3)],
        );

        let session = connector.connect(&Endpoint::new("h", 1)).await.unwrap();
        let params = SearchParams::new();
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let groups = session
            .search(BackendSearch {
                collection_name: "docs",
                vectors: &vectors,
                limit: 2,
                params: &params,
                output_fields: &[],
            })
            .await
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(connector.recorded_searches()[0].vectors, vectors);
    }

    #[tokio::test]
    async fn test_unknown_cluster_and_collection() {
        let connector = InMemoryConnector::new();
        assert!(matches!(
            connector.connect(&Endpoint::new("nowhere", 9)).await,
            Err(BackendError::Connect { .. })
        ));

        connector.add_cluster("h", 1);
        let session = connector.connect(&Endpoint::new("h", 1)).await.unwrap();
        let err = session.collection_info("missing").await.unwrap_err();
        assert!(err.to_string().contains("collection not found"));
    }
}
