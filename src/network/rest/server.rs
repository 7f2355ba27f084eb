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

//! REST server implementation using axum

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers::{create_router, AppState};
use crate::core::CorsConfig;

/// REST server for VectorGate
pub struct RestServer {
    router: Router,
    bind_addr: SocketAddr,
}

/// A server running in the background
pub struct RunningServer {
    pub local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), hyper::Error>>,
}

impl RestServer {
    /// Create new REST server
    pub fn new(bind_addr: SocketAddr, state: AppState, cors: &CorsConfig) -> Self {
        let router = create_router(state).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors)),
        );

        Self { router, bind_addr }
    }

    /// Bind and serve in the background until [`RunningServer::shutdown`]
    pub fn spawn(self) -> anyhow::Result<RunningServer> {
        info!("🌐 Starting REST server on {}", self.bind_addr);

        // For axum 0.6, use axum::Server
        let server = axum::Server::try_bind(&self.bind_addr)
            .with_context(|| format!("failed to bind {}", self.bind_addr))?
            .serve(self.router.into_make_service());
        let local_addr = server.local_addr();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.with_graceful_shutdown(async {
            rx.await.ok();
        }));

        info!("✅ REST server listening on {}", local_addr);
        info!("📋 Available endpoints:");
        info!("   POST   /api/auth/login                        - Obtain bearer token");
        info!("   GET    /api/database/connections              - List connections");
        info!("   POST   /api/database/connections/:id/connect  - Connect");
        info!("   GET    /api/database/connections/:id/statistics - Collection statistics");
        info!("   POST   /api/query/vector                      - Single-target query");
        info!("   POST   /api/query/multi                       - Multi-target query");
        info!("   POST   /api/query/upload-vector               - Query with uploaded vector");

        Ok(RunningServer {
            local_addr,
            shutdown: Some(tx),
            handle,
        })
    }
}

impl RunningServer {
    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await??;
        info!("🛑 REST server on {} stopped", self.local_addr);
        Ok(())
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("⚠️ Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
}
