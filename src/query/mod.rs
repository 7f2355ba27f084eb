// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Query engine: single-target execution and multi-target aggregation

pub mod aggregator;
pub mod executor;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{
    AggregatedResult, QueryConfig, QueryError, QueryVector, SearchOptions, SingleTargetResult,
    TargetId,
};
use crate::services::ConnectionService;

pub use aggregator::{merge_ranked, MultiTargetAggregator};
pub use executor::QueryExecutor;

/// Entry point used by the API layer
pub struct QueryEngine {
    executor: Arc<QueryExecutor>,
    aggregator: MultiTargetAggregator,
}

impl QueryEngine {
    pub fn new(connections: Arc<ConnectionService>, config: &QueryConfig) -> Self {
        let executor = Arc::new(QueryExecutor::new(connections, config));
        Self {
            aggregator: MultiTargetAggregator::new(executor.clone()),
            executor,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        self.executor.config()
    }

    pub async fn execute_single(
        &self,
        target_id: &str,
        collection_name: &str,
        vector: &QueryVector,
        options: &SearchOptions,
    ) -> Result<SingleTargetResult, QueryError> {
        self.executor
            .execute(target_id, collection_name, vector, options)
            .await
    }

    /// Never fails for partial backend failure
    pub async fn execute_multi(
        &self,
        target_ids: &[TargetId],
        collection_names: &HashMap<TargetId, String>,
        vector: &QueryVector,
        options: &SearchOptions,
    ) -> Result<AggregatedResult, QueryError> {
        self.aggregator
            .aggregate(target_ids, collection_names, vector, options)
            .await
    }
}
