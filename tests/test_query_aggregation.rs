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

//! Query executor and multi-target aggregation against the scripted backend

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use vectorgate::backend::{InMemoryConnector, RawHit};
use vectorgate::query::QueryEngine;
use vectorgate::registry::{ConnectionStatus, JsonFileStore};
use vectorgate::services::{ConnectionService, NewConnection};
use vectorgate::{QueryConfig, QueryError, QueryVector, SearchOptions, SearchParams};

struct Fixture {
    connector: InMemoryConnector,
    connections: Arc<ConnectionService>,
    engine: QueryEngine,
}

fn fixture(config: QueryConfig) -> Fixture {
    let connector = InMemoryConnector::new();
    let connections = Arc::new(ConnectionService::new(
        Arc::new(JsonFileStore::volatile()),
        Arc::new(connector.clone()),
    ));
    let engine = QueryEngine::new(connections.clone(), &config);
    Fixture {
        connector,
        connections,
        engine,
    }
}

impl Fixture {
    /// Register `host:port` as a connection and return its id
    async fn register(&self, name: &str, host: &str, port: u16) -> String {
        self.connections
            .create(
                NewConnection {
                    name: name.to_string(),
                    host: host.to_string(),
                    port,
                    username: None,
                    password: None,
                    description: None,
                },
                "test-user",
            )
            .await
            .unwrap()
            .id
    }
}

fn hits(pairs: &[(i64, f32)]) -> Vec<RawHit> {
    pairs.iter().map(|(id, d)| RawHit::new(*id, *d)).collect()
}

fn query() -> QueryVector {
    QueryVector::Single(vec![0.1, 0.2, 0.3])
}

fn collections(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(t, c)| (t.to_string(), c.to_string()))
        .collect()
}

#[tokio::test]
async fn test_two_targets_merge_into_global_ranking() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "coll1", hits(&[(1, 0.5), (2, 0.9)]));
    f.connector.add_collection("b", 1, "coll2", hits(&[(3, 0.3)]));
    let a = f.register("A", "a", 1).await;
    let b = f.register("B", "b", 1).await;

    let result = f
        .engine
        .execute_multi(
            &[a.clone(), b.clone()],
            &collections(&[(&a, "coll1"), (&b, "coll2")]),
            &query(),
            &SearchOptions::new(2),
        )
        .await
        .unwrap();

    let ranking: Vec<(String, String, f32)> = result
        .merged_hits
        .iter()
        .map(|m| (m.target_id.clone(), m.hit.id.to_string(), m.hit.distance))
        .collect();
    assert_eq!(
        ranking,
        vec![(b.clone(), "3".to_string(), 0.3), (a.clone(), "1".to_string(), 0.5)]
    );
    assert_eq!(result.merged_hits[0].collection_name, "coll2");
    assert_eq!(result.metrics.succeeded_target_count, 2);
    assert!(result.metrics.errors.is_empty());
    assert_eq!(result.metrics.merged_hit_count, 3);
    assert_eq!(result.results[&a].hits.len(), 2);
    assert_eq!(result.results[&a].metrics.hit_count, 2);
}

#[tokio::test]
async fn test_missing_collection_mapping_is_recorded_not_raised() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "coll1", hits(&[(1, 0.5)]));
    let a = f.register("A", "a", 1).await;

    let result = f
        .engine
        .execute_multi(
            &[a.clone(), "C".to_string()],
            &collections(&[(&a, "coll1")]),
            &query(),
            &SearchOptions::new(10),
        )
        .await
        .unwrap();

    assert_eq!(result.metrics.errors, vec!["no collection specified for target C"]);
    assert!(!result.results.contains_key("C"));
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.merged_hits.len(), 1);
}

#[tokio::test]
async fn test_blank_collection_mapping_counts_as_missing() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "coll1", hits(&[(1, 0.5)]));
    f.connector.add_collection("b", 1, "coll2", hits(&[(2, 0.1)]));
    let a = f.register("A", "a", 1).await;
    let b = f.register("B", "b", 1).await;

    let result = f
        .engine
        .execute_multi(
            &[a.clone(), b.clone()],
            &collections(&[(&a, "coll1"), (&b, "  ")]),
            &query(),
            &SearchOptions::new(10),
        )
        .await
        .unwrap();

    assert_eq!(
        result.metrics.errors,
        vec![format!("no collection specified for target {}", b)]
    );
    assert!(!result.results.contains_key(&b));
    assert_eq!(result.metrics.succeeded_target_count, 1);
    assert_eq!(f.connector.recorded_searches().len(), 1);
    assert_eq!(f.connector.connect_count(), 1);
}

#[tokio::test]
async fn test_every_target_failing_yields_empty_result() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "coll1", hits(&[(1, 0.5)]));
    f.connector.fail_search("a", 1, "coll1", "collection not loaded");
    f.connector.refuse_connections("b", 1);
    let a = f.register("A", "a", 1).await;
    let b = f.register("B", "b", 1).await;

    let targets = vec![a.clone(), b.clone(), "ghost".to_string()];
    let result = f
        .engine
        .execute_multi(
            &targets,
            &collections(&[(&a, "coll1"), (&b, "coll1"), ("ghost", "coll1")]),
            &query(),
            &SearchOptions::new(5),
        )
        .await
        .unwrap();

    assert!(result.results.is_empty());
    assert!(result.merged_hits.is_empty());
    assert_eq!(result.metrics.succeeded_target_count, 0);
    assert_eq!(result.metrics.errors.len(), 3);
    assert!(result.metrics.errors[0].starts_with(&format!("query failed for target {}:", a)));
    assert!(result.metrics.errors[0].contains("collection not loaded"));
    assert!(result.metrics.errors[1].contains("refused"));
    assert!(result.metrics.errors[2].contains("ghost"));
}

#[tokio::test]
async fn test_single_target_error_kinds() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "coll1", hits(&[(1, 0.5)]));
    f.connector.fail_search("a", 1, "coll1", "dimension mismatch: expected 8");
    f.connector.refuse_connections("down", 1);
    let a = f.register("A", "a", 1).await;
    let down = f.register("Down", "down", 1).await;

    let options = SearchOptions::new(5);
    assert!(matches!(
        f.engine.execute_single("nope", "coll1", &query(), &options).await,
        Err(QueryError::TargetNotFound(id)) if id == "nope"
    ));
    assert!(matches!(
        f.engine.execute_single(&down, "coll1", &query(), &options).await,
        Err(QueryError::ConnectionError(_))
    ));
    match f.engine.execute_single(&a, "coll1", &query(), &options).await {
        Err(QueryError::BackendQueryError(message)) => {
            assert!(message.contains("dimension mismatch: expected 8"))
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        f.connections.get(&down).await.unwrap().status,
        ConnectionStatus::Failed
    );
}

#[tokio::test]
async fn test_flat_and_batch_vectors_are_equivalent() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "coll1", hits(&[(7, 0.1), (8, 0.2)]));
    let a = f.register("A", "a", 1).await;
    let options = SearchOptions::new(10);

    let flat = f
        .engine
        .execute_single(&a, "coll1", &QueryVector::Single(vec![0.1, 0.2, 0.3]), &options)
        .await
        .unwrap();
    let batch = f
        .engine
        .execute_single(&a, "coll1", &QueryVector::Batch(vec![vec![0.1, 0.2, 0.3]]), &options)
        .await
        .unwrap();

    assert_eq!(flat.hits, batch.hits);
    let searches = f.connector.recorded_searches();
    assert_eq!(searches[0].vectors, searches[1].vectors);
}

#[tokio::test]
async fn test_repeated_query_is_stable_and_connects_once() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "coll1", hits(&[(1, 0.1), (2, 0.2), (3, 0.3)]));
    let a = f.register("A", "a", 1).await;
    let options = SearchOptions::new(2);

    let first = f.engine.execute_single(&a, "coll1", &query(), &options).await.unwrap();
    let second = f.engine.execute_single(&a, "coll1", &query(), &options).await.unwrap();

    let ids = |r: &vectorgate::SingleTargetResult| r.hits.iter().map(|h| h.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.hits.len(), 2);
    assert_eq!(f.connector.connect_count(), 1);
    assert_eq!(
        f.connections.get(&a).await.unwrap().status,
        ConnectionStatus::Connected
    );
}

#[tokio::test]
async fn test_default_params_and_output_fields_reach_backend() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection(
        "a",
        1,
        "coll1",
        vec![RawHit::new(1, 0.1)
            .with_field("title", json!("first"))
            .with_field("secret", json!("hidden"))],
    );
    let a = f.register("A", "a", 1).await;

    let options = SearchOptions::new(3)
        .with_output_fields(vec!["title".to_string(), "absent".to_string()]);
    let result = f.engine.execute_single(&a, "coll1", &query(), &options).await.unwrap();

    let hit = &result.hits[0];
    assert_eq!(hit.fields.get("title"), Some(&json!("first")));
    assert!(!hit.fields.contains_key("secret"));
    assert!(!hit.fields.contains_key("absent"));

    let search = &f.connector.recorded_searches()[0];
    assert_eq!(search.params.get("metric_type"), Some(&json!("L2")));
    assert_eq!(search.limit, 3);
    assert_eq!(search.output_fields, vec!["title", "absent"]);

    let mut custom = SearchParams::new();
    custom.insert("metric_type".to_string(), json!("IP"));
    f.engine
        .execute_single(&a, "coll1", &query(), &SearchOptions::new(3).with_search_params(custom))
        .await
        .unwrap();
    assert_eq!(
        f.connector.recorded_searches()[1].params.get("metric_type"),
        Some(&json!("IP"))
    );
}

#[tokio::test]
async fn test_slow_target_times_out_without_stalling_others() {
    let f = fixture(QueryConfig {
        target_timeout_ms: 100,
        ..Default::default()
    });
    f.connector.add_collection("fast", 1, "coll", hits(&[(1, 0.4)]));
    f.connector.add_collection("slow", 1, "coll", hits(&[(2, 0.1)]));
    f.connector.set_search_delay("slow", 1, Duration::from_secs(5));
    let fast = f.register("Fast", "fast", 1).await;
    let slow = f.register("Slow", "slow", 1).await;

    let result = f
        .engine
        .execute_multi(
            &[slow.clone(), fast.clone()],
            &collections(&[(&fast, "coll"), (&slow, "coll")]),
            &query(),
            &SearchOptions::new(5),
        )
        .await
        .unwrap();

    assert_eq!(result.metrics.succeeded_target_count, 1);
    assert_eq!(result.metrics.errors.len(), 1);
    assert!(result.metrics.errors[0].contains("timed out after 100 ms"));
    assert!(result.metrics.total_execution_time < 5.0);
    assert_eq!(result.merged_hits[0].target_id, fast);
}

#[tokio::test]
async fn test_parallel_and_sequential_fanout_agree() {
    let mut outputs = Vec::new();
    for parallel_fanout in [true, false] {
        let f = fixture(QueryConfig {
            parallel_fanout,
            ..Default::default()
        });
        f.connector.add_collection("a", 1, "c", hits(&[(1, 0.2), (2, 0.5)]));
        f.connector.add_collection("b", 1, "c", hits(&[(3, 0.2), (4, 0.1)]));
        // later-registered target answers first
        f.connector.set_search_delay("a", 1, Duration::from_millis(50));
        let a = f.register("A", "a", 1).await;
        let b = f.register("B", "b", 1).await;

        let result = f
            .engine
            .execute_multi(
                &[a.clone(), b.clone()],
                &collections(&[(&a, "c"), (&b, "c")]),
                &query(),
                &SearchOptions::new(10),
            )
            .await
            .unwrap();
        let ranking: Vec<(String, String)> = result
            .merged_hits
            .iter()
            .map(|m| {
                let origin = if m.target_id == a { "A" } else { "B" };
                (origin.to_string(), m.hit.id.to_string())
            })
            .collect();
        outputs.push(ranking);
    }

    let expected: Vec<(String, String)> = [("B", "4"), ("A", "1"), ("B", "3"), ("A", "2")]
        .iter()
        .map(|(t, id)| (t.to_string(), id.to_string()))
        .collect();
    assert_eq!(outputs[0], expected);
    assert_eq!(outputs[1], expected);
}

#[tokio::test]
async fn test_structurally_invalid_requests_raise() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "c", hits(&[(1, 0.2)]));
    let a = f.register("A", "a", 1).await;
    let mapping = collections(&[(&a, "c")]);

    assert!(matches!(
        f.engine
            .execute_multi(&[], &mapping, &query(), &SearchOptions::new(5))
            .await,
        Err(QueryError::InvalidRequest(_))
    ));
    assert!(matches!(
        f.engine
            .execute_multi(&[a.clone()], &mapping, &QueryVector::Single(vec![]), &SearchOptions::new(5))
            .await,
        Err(QueryError::InvalidRequest(_))
    ));
    assert!(matches!(
        f.engine
            .execute_multi(&[a.clone()], &mapping, &query(), &SearchOptions::new(0))
            .await,
        Err(QueryError::InvalidRequest(_))
    ));
    assert!(matches!(
        f.engine
            .execute_single(&a, "c", &QueryVector::Batch(vec![vec![1.0], vec![1.0, 2.0]]), &SearchOptions::new(5))
            .await,
        Err(QueryError::InvalidRequest(_))
    ));
    assert!(f.connector.recorded_searches().is_empty());
}

#[tokio::test]
async fn test_target_with_no_hits_is_still_reported() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "empty", vec![]);
    f.connector.add_collection("b", 1, "full", hits(&[(9, 0.9)]));
    let a = f.register("A", "a", 1).await;
    let b = f.register("B", "b", 1).await;

    let result = f
        .engine
        .execute_multi(
            &[a.clone(), b.clone()],
            &collections(&[(&a, "empty"), (&b, "full")]),
            &query(),
            &SearchOptions::new(10),
        )
        .await
        .unwrap();

    assert!(result.results[&a].hits.is_empty());
    assert_eq!(result.metrics.succeeded_target_count, 2);
    assert_eq!(result.merged_hits.len(), 1);
}

#[tokio::test]
async fn test_batch_hits_are_tagged_with_query_index() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "c", hits(&[(1, 0.2), (2, 0.4)]));
    let a = f.register("A", "a", 1).await;

    let batch = QueryVector::Batch(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
    let result = f
        .engine
        .execute_single(&a, "c", &batch, &SearchOptions::new(2))
        .await
        .unwrap();

    let tags: Vec<usize> = result.hits.iter().map(|h| h.query_index).collect();
    assert_eq!(tags, vec![0, 0, 1, 1]);
    assert_eq!(result.metrics.hit_count, 4);
}

#[tokio::test]
async fn test_duplicate_target_is_queried_per_occurrence() {
    let f = fixture(QueryConfig::default());
    f.connector.add_collection("a", 1, "c", hits(&[(1, 0.2)]));
    f.connector.add_collection("b", 1, "c", hits(&[(2, 0.2)]));
    let a = f.register("A", "a", 1).await;
    let b = f.register("B", "b", 1).await;

    let result = f
        .engine
        .execute_multi(
            &[a.clone(), b.clone(), a.clone()],
            &collections(&[(&a, "c"), (&b, "c")]),
            &query(),
            &SearchOptions::new(10),
        )
        .await
        .unwrap();

    assert_eq!(f.connector.recorded_searches().len(), 3);
    assert_eq!(result.results.len(), 2);
    let order: Vec<&str> = result.merged_hits.iter().map(|m| m.target_id.as_str()).collect();
    assert_eq!(order, vec![a.as_str(), b.as_str()]);
}
