// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Milvus adapter over the RESTful v2 API
//!
//! Endpoints used:
//! - `POST /v2/vectordb/collections/list` (also the liveness probe on connect)
//! - `POST /v2/vectordb/collections/get_stats`
//! - `POST /v2/vectordb/indexes/list`
//! - `POST /v2/vectordb/collections/load`
//! - `POST /v2/vectordb/entities/search`
//!
//! Every response is wrapped in `{"code": 0, "data": ..., "message": ...}`;
//! a non-zero code is surfaced as [`BackendError::Api`].

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::{BackendConnector, BackendSearch, BackendSession, CollectionInfo, Endpoint, RawHit};
use crate::core::{BackendConfig, BackendError, FieldMap, HitId, SearchParams, METRIC_TYPE_KEY};

/// Response envelope shared by every v2 endpoint
#[derive(Debug, Deserialize)]
struct MilvusResponse<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CollectionStats {
    #[serde(rename = "rowCount", default)]
    row_count: u64,
}

/// Connector producing [`MilvusSession`]s
pub struct MilvusConnector {
    client: Client,
    config: BackendConfig,
}

impl MilvusConnector {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn base_url(&self, endpoint: &Endpoint) -> String {
        let scheme = if self.config.tls_with_credentials && endpoint.has_credentials() {
            "https"
        } else {
            "http"
        };
        format!("{}://{}:{}", scheme, endpoint.host, endpoint.port)
    }
}

#[async_trait]
impl BackendConnector for MilvusConnector {
    fn backend_name(&self) -> &'static str {
        "milvus"
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn BackendSession>, BackendError> {
        let token = endpoint.username.as_ref().map(|user| {
            format!("{}:{}", user, endpoint.password.as_deref().unwrap_or_default())
        });

        let session = MilvusSession {
            client: self.client.clone(),
            base_url: self.base_url(endpoint),
            token,
            db_name: self.config.db_name.clone(),
            anns_field: self.config.anns_field.clone(),
            endpoint: endpoint.clone(),
        };

        // Probe so a dead endpoint fails here rather than on first search
        session
            .list_collections()
            .await
            .map_err(|e| BackendError::Connect {
                endpoint: endpoint.address(),
                reason: e.to_string(),
            })?;

        info!("🔌 Connected to Milvus at {}", session.base_url);
        Ok(Arc::new(session))
    }
}

/// Session against one Milvus deployment. The REST protocol is stateless, so
/// the session only carries the client, base URL and credentials.
pub struct MilvusSession {
    client: Client,
    base_url: String,
    token: Option<String>,
    db_name: String,
    anns_field: String,
    endpoint: Endpoint,
}

impl MilvusSession {
    /// POST and unwrap the envelope; `None` when the answer carries no data
    async fn post_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<Option<T>, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        open_envelope(path, &bytes)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, BackendError> {
        self.post_optional(path, body)
            .await?
            .ok_or_else(|| BackendError::Decode(format!("{} returned no data", path)))
    }

    async fn load_collection(&self, collection_name: &str) -> Result<(), BackendError> {
        // load may answer with an empty body or without a data field
        let _: Option<Value> = self
            .post_optional(
                "/v2/vectordb/collections/load",
                json!({ "dbName": self.db_name, "collectionName": collection_name }),
            )
            .await?;
        Ok(())
    }
}

/// Decode a response envelope. An empty body and a missing `data` field both
/// yield `None`; a non-zero code is an [`BackendError::Api`].
fn open_envelope<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<Option<T>, BackendError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let envelope: MilvusResponse<T> = serde_json::from_slice(body)
        .map_err(|e| BackendError::Decode(format!("{} returned malformed JSON: {}", path, e)))?;
    if envelope.code != 0 {
        return Err(BackendError::Api {
            code: envelope.code,
            message: envelope.message.unwrap_or_default(),
        });
    }
    Ok(envelope.data)
}

#[async_trait]
impl BackendSession for MilvusSession {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn list_collections(&self) -> Result<Vec<String>, BackendError> {
        self.post(
            "/v2/vectordb/collections/list",
            json!({ "dbName": self.db_name }),
        )
        .await
    }

    async fn collection_info(&self, collection_name: &str) -> Result<CollectionInfo, BackendError> {
        let stats: CollectionStats = self
            .post(
                "/v2/vectordb/collections/get_stats",
                json!({ "dbName": self.db_name, "collectionName": collection_name }),
            )
            .await?;

        let indexes: Vec<String> = self
            .post(
                "/v2/vectordb/indexes/list",
                json!({ "dbName": self.db_name, "collectionName": collection_name }),
            )
            .await?;

        Ok(CollectionInfo {
            name: collection_name.to_string(),
            entity_count: stats.row_count,
            has_index: !indexes.is_empty(),
        })
    }

    async fn search(&self, request: BackendSearch<'_>) -> Result<Vec<Vec<RawHit>>, BackendError> {
        self.load_collection(request.collection_name).await?;

        let search_params = to_milvus_search_params(request.params);
        let mut groups = Vec::with_capacity(request.vectors.len());

        // One request per query vector keeps hit groups separable
        for vector in request.vectors {
            let mut body = json!({
                "dbName": self.db_name,
                "collectionName": request.collection_name,
                "data": [vector],
                "annsField": self.anns_field,
                "limit": request.limit,
                "searchParams": search_params,
            });
            if !request.output_fields.is_empty() {
                body["outputFields"] = json!(request.output_fields);
            }

            let rows: Vec<Map<String, Value>> =
                self.post("/v2/vectordb/entities/search", body).await?;
            let hits = rows
                .into_iter()
                .map(parse_hit)
                .collect::<Result<Vec<_>, _>>()?;
            groups.push(hits);
        }

        debug!(
            "🔍 Milvus search on {}/{}: {} groups",
            self.base_url,
            request.collection_name,
            groups.len()
        );
        Ok(groups)
    }
}

/// `{"metric_type": "L2", "params": {"nprobe": 10}, "radius": 1.0}` becomes
/// `{"metricType": "L2", "params": {"nprobe": 10, "radius": 1.0}}`.
fn to_milvus_search_params(params: &SearchParams) -> Value {
    let mut out = Map::new();
    let mut inner = Map::new();

    for (key, value) in params {
        match key.as_str() {
            k if k == METRIC_TYPE_KEY || k == "metricType" => {
                out.insert("metricType".to_string(), value.clone());
            }
            "params" => {
                if let Value::Object(nested) = value {
                    inner.extend(nested.clone());
                }
            }
            _ => {
                inner.insert(key.clone(), value.clone());
            }
        }
    }

    if !inner.is_empty() {
        out.insert("params".to_string(), Value::Object(inner));
    }
    Value::Object(out)
}

fn parse_hit(mut row: Map<String, Value>) -> Result<RawHit, BackendError> {
    let distance = row
        .remove("distance")
        .and_then(|d| d.as_f64())
        .ok_or_else(|| BackendError::Decode("search hit without distance".to_string()))?;

    let id = row
        .remove("id")
        .or_else(|| row.remove("pk"))
        .ok_or_else(|| BackendError::Decode("search hit without primary key".to_string()))?;
    let id = match id {
        Value::Number(n) => n
            .as_i64()
            .map(HitId::Int)
            .ok_or_else(|| BackendError::Decode(format!("unsupported primary key {}", n)))?,
        Value::String(s) => HitId::Text(s),
        other => {
            return Err(BackendError::Decode(format!(
                "unsupported primary key {}",
                other
            )))
        }
    };

    Ok(RawHit {
        id,
        distance: distance as f32,
        entity: row.into_iter().collect::<FieldMap>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_translation() {
        let mut params = SearchParams::new();
        params.insert("metric_type".to_string(), json!("IP"));
        params.insert("params".to_string(), json!({ "nprobe": 16 }));
        params.insert("radius".to_string(), json!(0.5));

        let out = to_milvus_search_params(&params);
        assert_eq!(out["metricType"], "IP");
        assert_eq!(out["params"]["nprobe"], 16);
        assert_eq!(out["params"]["radius"], 0.5);
        assert!(out.get("metric_type").is_none());
    }

    #[test]
    fn test_parse_hit_splits_entity_fields() {
        let row = json!({ "id": 42, "distance": 0.125, "title": "alpha" });
        let Value::Object(row) = row else { unreachable!() };

        let hit = parse_hit(row).unwrap();
        assert_eq!(hit.id, HitId::Int(42));
        assert_eq!(hit.distance, 0.125);
        assert_eq!(hit.field("title"), Some(&json!("alpha")));
        assert!(hit.field("distance").is_none());
    }

    #[test]
    fn test_parse_hit_string_key_and_missing_distance() {
        let Value::Object(row) = json!({ "pk": "doc-1", "distance": 1.0 }) else { unreachable!() };
        assert_eq!(parse_hit(row).unwrap().id, HitId::Text("doc-1".to_string()));

        let Value::Object(row) = json!({ "id": 1 }) else { unreachable!() };
        assert!(matches!(parse_hit(row), Err(BackendError::Decode(_))));
    }

    #[test]
    fn test_envelope_without_data() {
        let path = "/v2/vectordb/collections/load";
        assert!(open_envelope::<Value>(path, b"").unwrap().is_none());
        assert!(open_envelope::<Value>(path, b" \n").unwrap().is_none());
        assert!(open_envelope::<Value>(path, br#"{"code": 0}"#).unwrap().is_none());

        let names: Option<Vec<String>> =
            open_envelope(path, br#"{"code": 0, "data": ["docs"]}"#).unwrap();
        assert_eq!(names, Some(vec!["docs".to_string()]));
    }

    #[test]
    fn test_envelope_errors_are_kept() {
        let path = "/v2/vectordb/collections/load";
        let err = open_envelope::<Value>(path, br#"{"code": 100, "message": "collection not found"}"#)
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { code: 100, .. }));
        assert!(err.to_string().contains("collection not found"));

        assert!(matches!(
            open_envelope::<Value>(path, b"<html>bad gateway</html>"),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn test_https_only_with_credentials() {
        let connector = MilvusConnector::new(&BackendConfig::default()).unwrap();
        let mut endpoint = Endpoint::new("milvus", 19530);
        assert_eq!(connector.base_url(&endpoint), "http://milvus:19530");

        endpoint.username = Some("root".to_string());
        assert_eq!(connector.base_url(&endpoint), "https://milvus:19530");
    }
}
