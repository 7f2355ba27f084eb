// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Single-Target Query Executor
//!
//! Resolves one target through the registry, makes sure a session is live,
//! runs one similarity search and normalizes the backend's hit groups into
//! [`Hit`]s. Only the backend search call is timed; the whole call (connect
//! included) runs under the per-target timeout.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::backend::{BackendSearch, RawHit};
use crate::core::{
    FieldMap, Hit, QueryConfig, QueryError, QueryMetrics, QueryVector, SearchOptions,
    SingleTargetResult,
};
use crate::services::ConnectionService;

/// Keys a hit already serializes; entity fields with these names are not
/// copied onto the hit
const RESERVED_FIELDS: [&str; 5] = ["id", "distance", "query_index", "target_id", "collection_name"];

pub struct QueryExecutor {
    connections: Arc<ConnectionService>,
    config: QueryConfig,
}

impl QueryExecutor {
    pub fn new(connections: Arc<ConnectionService>, config: &QueryConfig) -> Self {
        Self {
            connections,
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Query one target. Fails with `InvalidRequest`, `TargetNotFound`,
    /// `ConnectionError` or `BackendQueryError`; nothing is retried.
    pub async fn execute(
        &self,
        target_id: &str,
        collection_name: &str,
        vector: &QueryVector,
        options: &SearchOptions,
    ) -> Result<SingleTargetResult, QueryError> {
        options.validate(self.config.max_top_k)?;
        let vectors = vector.normalize()?;
        self.run(target_id, collection_name, &vectors, options).await
    }

    /// Query one target with an already validated, normalized batch
    pub(crate) async fn run(
        &self,
        target_id: &str,
        collection_name: &str,
        vectors: &[Vec<f32>],
        options: &SearchOptions,
    ) -> Result<SingleTargetResult, QueryError> {
        let timeout = self.config.target_timeout();
        let search = self.search_target(target_id, collection_name, vectors, options);
        match tokio::time::timeout(timeout, search).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("⏱️ Query on {}/{} timed out", target_id, collection_name);
                Err(QueryError::BackendQueryError(format!(
                    "timed out after {} ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    async fn search_target(
        &self,
        target_id: &str,
        collection_name: &str,
        vectors: &[Vec<f32>],
        options: &SearchOptions,
    ) -> Result<SingleTargetResult, QueryError> {
        if collection_name.trim().is_empty() {
            return Err(QueryError::InvalidRequest(
                "collection_name must not be empty".to_string(),
            ));
        }

        let record = self
            .connections
            .lookup(target_id)
            .await
            .map_err(|e| QueryError::ConnectionError(e.to_string()))?
            .ok_or_else(|| QueryError::TargetNotFound(target_id.to_string()))?;

        let session = self
            .connections
            .ensure_connected(&record)
            .await
            .map_err(|e| QueryError::ConnectionError(e.to_string()))?;

        let params = options.effective_search_params();
        let output_fields = options.output_fields();

        let start_time = Instant::now();
        let groups = session
            .search(BackendSearch {
                collection_name,
                vectors,
                limit: options.top_k,
                params: &params,
                output_fields,
            })
            .await
            .map_err(|e| QueryError::BackendQueryError(e.to_string()))?;
        let execution_time = start_time.elapsed().as_secs_f64();

        let hits = flatten_groups(groups, output_fields);
        debug!(
            "🔍 {}/{}: {} hits for {} query vectors in {:.3}s",
            target_id,
            collection_name,
            hits.len(),
            vectors.len(),
            execution_time
        );

        Ok(SingleTargetResult {
            target_id: target_id.to_string(),
            collection_name: collection_name.to_string(),
            metrics: QueryMetrics {
                execution_time,
                hit_count: hits.len(),
            },
            hits,
        })
    }
}

/// Concatenate per-query-vector groups in query order, tagging each hit with
/// the index of its query vector. Backend order inside a group is kept.
pub fn flatten_groups(groups: Vec<Vec<RawHit>>, output_fields: &[String]) -> Vec<Hit> {
    groups
        .into_iter()
        .enumerate()
        .flat_map(|(query_index, group)| {
            group
                .into_iter()
                .map(move |raw| to_hit(raw, query_index, output_fields))
        })
        .collect()
}

fn to_hit(mut raw: RawHit, query_index: usize, output_fields: &[String]) -> Hit {
    let mut fields = FieldMap::new();
    for name in output_fields {
        if RESERVED_FIELDS.contains(&name.as_str()) {
            continue;
        }
        // absent fields stay unset
        if let Some(value) = raw.entity.remove(name) {
            fields.insert(name.clone(), value);
        }
    }

    Hit {
        id: raw.id,
        distance: raw.distance,
        query_index,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_tags_query_index() {
        let groups = vec![
            vec![RawHit::new(1, 0.1), RawHit::new(2, 0.4)],
            vec![RawHit::new(3, 0.2)],
        ];
        let hits = flatten_groups(groups, &[]);
        let ids: Vec<_> = hits.iter().map(|h| (h.id.to_string(), h.query_index)).collect();
        assert_eq!(
            ids,
            vec![
                ("1".to_string(), 0),
                ("2".to_string(), 0),
                ("3".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_only_requested_fields_are_copied() {
        let raw = RawHit::new(1, 0.5)
            .with_field("title", json!("alpha"))
            .with_field("body", json!("long text"))
            .with_field("distance", json!(9.0));
        let fields = vec!["title".to_string(), "missing".to_string(), "distance".to_string()];

        let hits = flatten_groups(vec![vec![raw]], &fields);
        assert_eq!(hits[0].fields.len(), 1);
        assert_eq!(hits[0].fields.get("title"), Some(&json!("alpha")));
        assert_eq!(hits[0].distance, 0.5);
    }
}
