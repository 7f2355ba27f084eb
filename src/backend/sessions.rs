// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Shared registry of live backend sessions, keyed by connection id

use dashmap::DashMap;
use std::sync::Arc;

use super::BackendSession;

/// Sessions are shared across in-flight requests. Nothing here assumes
/// exclusive access to a session.
#[derive(Default)]
pub struct SessionPool {
    sessions: DashMap<String, Arc<dyn BackendSession>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session alias for a connection id
    pub fn alias(connection_id: &str) -> String {
        format!("conn_{}", connection_id)
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.sessions.contains_key(connection_id)
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<dyn BackendSession>> {
        self.sessions
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    /// Register a session. When another task registered one first, that
    /// session wins and is returned.
    pub fn insert(
        &self,
        connection_id: &str,
        session: Arc<dyn BackendSession>,
    ) -> Arc<dyn BackendSession> {
        self.sessions
            .entry(connection_id.to_string())
            .or_insert(session)
            .value()
            .clone()
    }

    pub fn remove(&self, connection_id: &str) -> Option<Arc<dyn BackendSession>> {
        self.sessions
            .remove(connection_id)
            .map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendConnector, Endpoint, InMemoryConnector};

    #[tokio::test]
    async fn test_first_registered_session_wins() {
        let connector = InMemoryConnector::new();
        connector.add_cluster("h", 1);
        let endpoint = Endpoint::new("h", 1);

        let pool = SessionPool::new();
        let first = connector.connect(&endpoint).await.unwrap();
        let second = connector.connect(&endpoint).await.unwrap();

        let kept = pool.insert("c1", first.clone());
        assert!(Arc::ptr_eq(&kept, &first));
        let kept = pool.insert("c1", second);
        assert!(Arc::ptr_eq(&kept, &first));
        assert_eq!(pool.len(), 1);

        assert!(pool.remove("c1").is_some());
        assert!(!pool.contains("c1"));
        assert_eq!(SessionPool::alias("c1"), "conn_c1");
    }
}
