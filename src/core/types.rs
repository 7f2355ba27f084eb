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

//! Request-scoped query types shared by the executor, the aggregation engine
//! and the REST layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::errors::QueryError;

/// Target (connection) identifier
pub type TargetId = String;

/// Opaque backend-specific search parameters, e.g. `{"metric_type": "IP"}`
pub type SearchParams = HashMap<String, serde_json::Value>;

/// Extra entity fields attached to a hit, keyed by field name
pub type FieldMap = HashMap<String, serde_json::Value>;

/// Metric used when the caller supplies no search parameters
pub const DEFAULT_METRIC_TYPE: &str = "L2";

/// Key under which the distance metric travels in [`SearchParams`]
pub const METRIC_TYPE_KEY: &str = "metric_type";

/// One query vector or a batch of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryVector {
    Single(Vec<f32>),
    Batch(Vec<Vec<f32>>),
}

impl QueryVector {
    /// Wrap a single vector as a batch of one so single and batch calls share
    /// one code path. Rejects empty input, ragged batches and non-finite
    /// components.
    pub fn normalize(&self) -> Result<Vec<Vec<f32>>, QueryError> {
        let batch = match self {
            QueryVector::Single(vector) => vec![vector.clone()],
            QueryVector::Batch(vectors) => vectors.clone(),
        };

        if batch.is_empty() {
            return Err(QueryError::InvalidRequest(
                "vector_data must contain at least one vector".to_string(),
            ));
        }

        let dimension = batch[0].len();
        for (index, vector) in batch.iter().enumerate() {
            if vector.is_empty() {
                return Err(QueryError::InvalidRequest(format!(
                    "query vector {} is empty",
                    index
                )));
            }
            if vector.len() != dimension {
                return Err(QueryError::InvalidRequest(format!(
                    "query vector {} has dimension {}, expected {}",
                    index,
                    vector.len(),
                    dimension
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(QueryError::InvalidRequest(format!(
                    "query vector {} contains a non-finite value",
                    index
                )));
            }
        }

        Ok(batch)
    }

    /// Number of query vectors
    pub fn len(&self) -> usize {
        match self {
            QueryVector::Single(_) => 1,
            QueryVector::Batch(vectors) => vectors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<f32>> for QueryVector {
    fn from(vector: Vec<f32>) -> Self {
        QueryVector::Single(vector)
    }
}

impl From<Vec<Vec<f32>>> for QueryVector {
    fn from(vectors: Vec<Vec<f32>>) -> Self {
        QueryVector::Batch(vectors)
    }
}

/// Backend-assigned primary key of a hit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HitId {
    Int(i64),
    Text(String),
}

impl fmt::Display for HitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitId::Int(id) => write!(f, "{}", id),
            HitId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for HitId {
    fn from(id: i64) -> Self {
        HitId::Int(id)
    }
}

impl From<i32> for HitId {
    fn from(id: i32) -> Self {
        HitId::Int(i64::from(id))
    }
}

impl From<&str> for HitId {
    fn from(id: &str) -> Self {
        HitId::Text(id.to_string())
    }
}

/// One search result record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: HitId,
    /// Lower is more similar for the default L2 metric
    pub distance: f32,
    /// Position of the query vector that produced this hit
    #[serde(default)]
    pub query_index: usize,
    /// Requested output fields that the backend returned
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Hit {
    pub fn new(id: impl Into<HitId>, distance: f32) -> Self {
        Self {
            id: id.into(),
            distance,
            query_index: 0,
            fields: FieldMap::new(),
        }
    }
}

/// Options shared by every target in a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub top_k: usize,
    #[serde(default)]
    pub search_params: Option<SearchParams>,
    #[serde(default)]
    pub output_fields: Option<Vec<String>>,
}

impl SearchOptions {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            search_params: None,
            output_fields: None,
        }
    }

    pub fn with_search_params(mut self, params: SearchParams) -> Self {
        self.search_params = Some(params);
        self
    }

    pub fn with_output_fields(mut self, fields: Vec<String>) -> Self {
        self.output_fields = Some(fields);
        self
    }

    pub fn validate(&self, max_top_k: usize) -> Result<(), QueryError> {
        if self.top_k == 0 {
            return Err(QueryError::InvalidRequest(
                "top_k must be a positive integer".to_string(),
            ));
        }
        if self.top_k > max_top_k {
            return Err(QueryError::InvalidRequest(format!(
                "top_k {} exceeds the maximum of {}",
                self.top_k, max_top_k
            )));
        }
        Ok(())
    }

    /// Caller-supplied parameters, or `{metric_type: "L2"}` when none were given
    pub fn effective_search_params(&self) -> SearchParams {
        match &self.search_params {
            Some(params) if !params.is_empty() => params.clone(),
            _ => {
                let mut params = SearchParams::new();
                params.insert(
                    METRIC_TYPE_KEY.to_string(),
                    serde_json::Value::String(DEFAULT_METRIC_TYPE.to_string()),
                );
                params
            }
        }
    }

    pub fn output_fields(&self) -> &[String] {
        self.output_fields.as_deref().unwrap_or(&[])
    }
}

/// Per-target execution metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
    /// Seconds spent in the backend search call
    pub execution_time: f64,
    pub hit_count: usize,
}

/// Result of querying one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTargetResult {
    pub target_id: TargetId,
    pub collection_name: String,
    pub hits: Vec<Hit>,
    pub metrics: QueryMetrics,
}

/// A hit in the merged ranking, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedHit {
    pub target_id: TargetId,
    pub collection_name: String,
    #[serde(flatten)]
    pub hit: Hit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Seconds for the whole fan-out, merge included
    pub total_execution_time: f64,
    pub succeeded_target_count: usize,
    /// One message per failed or skipped target, in target order
    pub errors: Vec<String>,
    /// Merged hits before truncation to `top_k`
    pub merged_hit_count: usize,
}

/// Result of a multi-target query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Only targets that succeeded
    pub results: HashMap<TargetId, SingleTargetResult>,
    pub merged_hits: Vec<MergedHit>,
    pub metrics: AggregateMetrics,
}
