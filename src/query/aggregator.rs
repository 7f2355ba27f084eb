// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Multi-Target Aggregation Engine
//!
//! Runs the same query against every target, isolates per-target failures
//! into the `errors` list and merges the successful hit lists into a single
//! ranking.
//!
//! ## Ordering
//! Targets may run concurrently, but outcomes are always reduced in
//! `target_ids` order. The merge sort is stable, so equal distances keep
//! target order first and backend order second.
//!
//! The merge assumes every target shares one metric space. Nothing checks
//! this.

use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::executor::QueryExecutor;
use crate::core::{
    AggregateMetrics, AggregatedResult, MergedHit, QueryError, QueryVector, SearchOptions,
    SingleTargetResult, TargetId,
};

pub struct MultiTargetAggregator {
    executor: Arc<QueryExecutor>,
}

impl MultiTargetAggregator {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Query every target in `target_ids`. Only a structurally invalid
    /// request fails; per-target failures land in `metrics.errors`.
    pub async fn aggregate(
        &self,
        target_ids: &[TargetId],
        collection_names: &HashMap<TargetId, String>,
        vector: &QueryVector,
        options: &SearchOptions,
    ) -> Result<AggregatedResult, QueryError> {
        let start_time = Instant::now();

        if target_ids.is_empty() {
            return Err(QueryError::InvalidRequest(
                "target_ids must name at least one target".to_string(),
            ));
        }
        options.validate(self.executor.config().max_top_k)?;
        let vectors = vector.normalize()?;

        let outcomes = if self.executor.config().parallel_fanout {
            join_all(
                target_ids
                    .iter()
                    .map(|id| self.run_target(id, collection_names, &vectors, options)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(target_ids.len());
            for id in target_ids {
                outcomes.push(self.run_target(id, collection_names, &vectors, options).await);
            }
            outcomes
        };

        let mut results: HashMap<TargetId, SingleTargetResult> = HashMap::new();
        let mut order: Vec<&TargetId> = Vec::new();
        let mut errors = Vec::new();

        for (target_id, outcome) in target_ids.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    if !results.contains_key(target_id) {
                        order.push(target_id);
                    }
                    results.insert(target_id.clone(), result);
                }
                Err(message) => {
                    warn!("⚠️ {}", message);
                    errors.push(message);
                }
            }
        }

        let (merged_hits, merged_hit_count) =
            merge_ranked(order.iter().filter_map(|id| results.get(*id)), options.top_k);

        let total_execution_time = start_time.elapsed().as_secs_f64();
        info!(
            "✅ Multi-target query: {}/{} targets succeeded, {} of {} merged hits kept in {:.3}s",
            results.len(),
            target_ids.len(),
            merged_hits.len(),
            merged_hit_count,
            total_execution_time
        );

        Ok(AggregatedResult {
            metrics: AggregateMetrics {
                total_execution_time,
                succeeded_target_count: results.len(),
                errors,
                merged_hit_count,
            },
            results,
            merged_hits,
        })
    }

    async fn run_target(
        &self,
        target_id: &str,
        collection_names: &HashMap<TargetId, String>,
        vectors: &[Vec<f32>],
        options: &SearchOptions,
    ) -> Result<SingleTargetResult, String> {
        let Some(collection_name) = collection_names
            .get(target_id)
            .filter(|name| !name.trim().is_empty())
        else {
            return Err(format!("no collection specified for target {}", target_id));
        };

        debug!("📤 Dispatching query to {}/{}", target_id, collection_name);
        self.executor
            .run(target_id, collection_name, vectors, options)
            .await
            .map_err(|e| format!("query failed for target {}: {}", target_id, e))
    }
}

/// Merge per-target hits into one ranking, ascending by distance, and
/// truncate it to `top_k`. Returns the ranking and the hit count before
/// truncation.
///
/// The sort is stable: ties keep the order in which `results` yields targets
/// and, within a target, backend order. Signed zeros compare equal and NaN
/// distances sort last.
pub fn merge_ranked<'a, I>(results: I, top_k: usize) -> (Vec<MergedHit>, usize)
where
    I: IntoIterator<Item = &'a SingleTargetResult>,
{
    let mut merged: Vec<MergedHit> = results
        .into_iter()
        .flat_map(|result| {
            result.hits.iter().map(move |hit| MergedHit {
                target_id: result.target_id.clone(),
                collection_name: result.collection_name.clone(),
                hit: hit.clone(),
            })
        })
        .collect();

    merged.sort_by(|a, b| compare_distance(a.hit.distance, b.hit.distance));

    let merged_hit_count = merged.len();
    merged.truncate(top_k);
    (merged, merged_hit_count)
}

/// Ascending, with `-0.0 == 0.0` and NaN after every number
fn compare_distance(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    }
}
