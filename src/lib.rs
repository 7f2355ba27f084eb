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

//! # VectorGate
//!
//! Management gateway for external vector databases.
//!
//! Authenticated users register connections to external vector-search
//! clusters, toggle connectivity, inspect collection statistics and run
//! nearest-neighbor queries against one cluster or fanned out across
//! several, with the hits merged into a single ranking.
//!
//! ## Layout
//!
//! - [`registry`] - connection and user records (JSON document store)
//! - [`backend`] - client adapters for external vector databases (Milvus)
//! - [`query`] - single-target executor and multi-target aggregation
//! - [`services`] - connection management, accounts, tokens
//! - [`network`] - axum REST API
//! - [`monitoring`] - Prometheus metrics

pub mod backend;
pub mod core;
pub mod monitoring;
pub mod network;
pub mod query;
pub mod registry;
pub mod services;

pub use crate::core::*;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

use backend::{BackendConnector, MilvusConnector};
use monitoring::GatewayMetrics;
use network::{AppState, RestServer, RunningServer};
use query::QueryEngine;
use registry::JsonFileStore;
use services::{ConnectionService, UserService};

/// Main VectorGate instance
pub struct VectorGate {
    config: Config,
    state: AppState,
    server: Option<RunningServer>,
}

impl VectorGate {
    /// Build against Milvus with the configured backend settings
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let connector = MilvusConnector::new(&config.backend)
            .context("failed to build the Milvus client")?;
        Self::with_connector(config, Arc::new(connector)).await
    }

    /// Build against any backend connector
    pub async fn with_connector(
        config: Config,
        connector: Arc<dyn BackendConnector>,
    ) -> anyhow::Result<Self> {
        tracing::info!("🚀 VectorGate::new - opening registry at {:?}", config.registry_path());
        let store = Arc::new(
            JsonFileStore::open(config.registry_path())
                .await
                .context("failed to open the registry")?,
        );

        let connections = Arc::new(ConnectionService::new(store.clone(), connector));
        let users = Arc::new(UserService::new(store, &config.auth));
        users
            .bootstrap_admin()
            .await
            .context("failed to bootstrap the admin account")?;

        let queries = Arc::new(QueryEngine::new(connections.clone(), &config.query));
        let metrics = if config.monitoring.metrics_enabled {
            Some(Arc::new(GatewayMetrics::new()?))
        } else {
            None
        };

        tracing::info!("✅ VectorGate::new - services ready");
        Ok(Self {
            state: AppState {
                connections,
                users,
                queries,
                metrics,
            },
            config,
            server: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Start the REST server; returns the bound address
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        if let Some(server) = &self.server {
            return Ok(server.local_addr);
        }

        let bind_addr: SocketAddr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        )
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                self.config.server.bind_address, self.config.server.port
            )
        })?;

        let server = RestServer::new(bind_addr, self.state.clone(), &self.config.cors).spawn()?;
        let local_addr = server.local_addr;
        self.server = Some(server);
        Ok(local_addr)
    }

    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(server) = self.server.take() {
            server.shutdown().await?;
        }
        Ok(())
    }

    /// Get HTTP server address
    pub fn http_address(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|server| server.local_addr)
    }
}
