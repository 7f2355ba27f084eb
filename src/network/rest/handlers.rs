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

//! REST API handlers that delegate to the services and the query engine

use axum::{
    extract::{Extension, Form, Json, Multipart, Path, State},
    http::header,
    middleware,
    response::{IntoResponse, Json as JsonResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::errors::ApiError;
use super::models::{
    search_options, ConnectionView, DeleteResponse, LoginForm, MultiQueryRequest,
    VectorQueryRequest,
};
use crate::core::{AggregatedResult, QueryVector, SingleTargetResult};
use crate::monitoring::{GatewayMetrics, QueryKind};
use crate::network::middleware::{require_bearer, CurrentUser};
use crate::query::QueryEngine;
use crate::services::{
    AccessToken, ConnectionPatch, ConnectionService, ConnectionStatusReport, DatabaseStatistics,
    NewConnection, NewUser, UserProfile, UserService,
};

/// Shared application state for REST handlers
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionService>,
    pub users: Arc<UserService>,
    pub queries: Arc<QueryEngine>,
    /// `None` when metrics are disabled
    pub metrics: Option<Arc<GatewayMetrics>>,
}

impl AppState {
    fn observe(&self, kind: QueryKind, succeeded: bool, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_query(kind, succeeded, started.elapsed().as_secs_f64());
        }
    }
}

/// Create REST router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        // Accounts
        .route("/api/auth/me", get(current_user))
        .route("/api/auth/register", post(register_user))
        // Connection management
        .route(
            "/api/database/connections",
            get(list_connections).post(create_connection),
        )
        .route(
            "/api/database/connections/:connection_id",
            put(update_connection).delete(delete_connection),
        )
        .route(
            "/api/database/connections/:connection_id/connect",
            post(connect_database),
        )
        .route(
            "/api/database/connections/:connection_id/disconnect",
            post(disconnect_database),
        )
        .route(
            "/api/database/connections/:connection_id/statistics",
            get(database_statistics),
        )
        // Queries
        .route("/api/query/vector", post(query_vector))
        .route("/api/query/multi", post(query_multi))
        .route("/api/query/upload-vector", post(query_uploaded_vector))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(root))
        .route("/api/test", get(api_test))
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .route("/api/auth/login", post(login))
        .route("/api/auth/simple-login", post(login))
        .route("/api/direct-login", post(login))
        .merge(authenticated)
        .with_state(state)
}

async fn root() -> JsonResponse<Value> {
    JsonResponse(json!({
        "message": "VectorGate vector database management API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn api_test() -> JsonResponse<Value> {
    JsonResponse(json!({ "status": "ok", "message": "API server is running" }))
}

async fn health_check(State(state): State<AppState>) -> JsonResponse<Value> {
    JsonResponse(json!({
        "status": "healthy",
        "live_sessions": state.connections.sessions().len(),
    }))
}

async fn prometheus_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let metrics = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("metrics are disabled".to_string()))?;
    let body = metrics
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<JsonResponse<AccessToken>, ApiError> {
    info!("🔑 Login attempt: {}", form.username);
    let token = state.users.login(&form.username, &form.password).await?;
    Ok(JsonResponse(token))
}

async fn current_user(Extension(user): Extension<CurrentUser>) -> JsonResponse<UserProfile> {
    JsonResponse(user.0)
}

async fn register_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<NewUser>,
) -> Result<JsonResponse<UserProfile>, ApiError> {
    let admin = user.require_admin()?;
    debug!("👤 {} registering {}", admin.username, input.username);
    Ok(JsonResponse(state.users.create_user(input).await?))
}

async fn list_connections(
    State(state): State<AppState>,
) -> Result<JsonResponse<Vec<ConnectionView>>, ApiError> {
    let records = state.connections.list().await?;
    Ok(JsonResponse(records.iter().map(ConnectionView::from).collect()))
}

async fn create_connection(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<NewConnection>,
) -> Result<JsonResponse<ConnectionView>, ApiError> {
    let admin = user.require_admin()?;
    let record = state.connections.create(input, &admin.id).await?;
    Ok(JsonResponse(ConnectionView::from(&record)))
}

async fn update_connection(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(connection_id): Path<String>,
    Json(patch): Json<ConnectionPatch>,
) -> Result<JsonResponse<ConnectionView>, ApiError> {
    user.require_admin()?;
    let record = state.connections.update(&connection_id, patch).await?;
    Ok(JsonResponse(ConnectionView::from(&record)))
}

async fn delete_connection(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(connection_id): Path<String>,
) -> Result<JsonResponse<DeleteResponse>, ApiError> {
    user.require_admin()?;
    state.connections.delete(&connection_id).await?;
    Ok(JsonResponse(DeleteResponse { success: true }))
}

async fn connect_database(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(connection_id): Path<String>,
) -> Result<JsonResponse<ConnectionStatusReport>, ApiError> {
    user.require_admin()?;
    Ok(JsonResponse(state.connections.connect(&connection_id).await?))
}

async fn disconnect_database(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(connection_id): Path<String>,
) -> Result<JsonResponse<ConnectionStatusReport>, ApiError> {
    user.require_admin()?;
    Ok(JsonResponse(state.connections.disconnect(&connection_id).await?))
}

async fn database_statistics(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> Result<JsonResponse<DatabaseStatistics>, ApiError> {
    Ok(JsonResponse(state.connections.statistics(&connection_id).await?))
}

async fn query_vector(
    State(state): State<AppState>,
    Json(request): Json<VectorQueryRequest>,
) -> Result<JsonResponse<SingleTargetResult>, ApiError> {
    let started = Instant::now();
    let options = request.options(state.queries.config().default_top_k);
    let outcome = state
        .queries
        .execute_single(
            &request.target_id,
            &request.collection_name,
            &request.vector_data,
            &options,
        )
        .await;

    state.observe(QueryKind::Single, outcome.is_ok(), started);
    Ok(JsonResponse(outcome?))
}

async fn query_multi(
    State(state): State<AppState>,
    Json(request): Json<MultiQueryRequest>,
) -> Result<JsonResponse<AggregatedResult>, ApiError> {
    let started = Instant::now();
    let options = request.options(state.queries.config().default_top_k);
    let outcome = state
        .queries
        .execute_multi(
            &request.target_ids,
            &request.collection_names,
            &request.vector_data,
            &options,
        )
        .await;

    state.observe(QueryKind::Multi, outcome.is_ok(), started);
    let result = outcome?;
    if let Some(metrics) = &state.metrics {
        metrics.record_target_failures(result.metrics.errors.len());
    }
    Ok(JsonResponse(result))
}

/// Multipart query: `database_id`, `collection_name`, optional `top_k` and a
/// `vector_file` holding a JSON vector or batch
async fn query_uploaded_vector(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<JsonResponse<SingleTargetResult>, ApiError> {
    let mut target_id = None;
    let mut collection_name = None;
    let mut top_k = None;
    let mut vector_data = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "database_id" | "target_id" => target_id = Some(field.text().await?),
            "collection_name" => collection_name = Some(field.text().await?),
            "top_k" => {
                let raw = field.text().await?;
                let parsed = raw.trim().parse::<usize>().map_err(|_| {
                    ApiError::BadRequest(format!("top_k must be a positive integer, got '{}'", raw))
                })?;
                top_k = Some(parsed);
            }
            "vector_file" => {
                let bytes = field.bytes().await?;
                let parsed = serde_json::from_slice::<QueryVector>(&bytes).map_err(|e| {
                    ApiError::BadRequest(format!(
                        "vector_file must contain a JSON vector or list of vectors: {}",
                        e
                    ))
                })?;
                vector_data = Some(parsed);
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let target_id =
        target_id.ok_or_else(|| ApiError::BadRequest("database_id is required".to_string()))?;
    let collection_name = collection_name
        .ok_or_else(|| ApiError::BadRequest("collection_name is required".to_string()))?;
    let vector_data =
        vector_data.ok_or_else(|| ApiError::BadRequest("vector_file is required".to_string()))?;

    let started = Instant::now();
    let options = search_options(top_k, None, None, state.queries.config().default_top_k);
    let outcome = state
        .queries
        .execute_single(&target_id, &collection_name, &vector_data, &options)
        .await;

    state.observe(QueryKind::Upload, outcome.is_ok(), started);
    Ok(JsonResponse(outcome?))
}
