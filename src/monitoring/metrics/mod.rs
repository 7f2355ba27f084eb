// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Query metrics on a private Prometheus registry

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Which API surface issued a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Single,
    Multi,
    Upload,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Single => "single",
            QueryKind::Multi => "multi",
            QueryKind::Upload => "upload",
        }
    }
}

pub struct GatewayMetrics {
    registry: Registry,
    queries_total: IntCounterVec,
    query_latency: HistogramVec,
    target_failures: IntCounter,
}

impl GatewayMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let queries_total = IntCounterVec::new(
            Opts::new("vectorgate_queries_total", "Queries handled, by kind and outcome"),
            &["kind", "outcome"],
        )?;
        let query_latency = HistogramVec::new(
            HistogramOpts::new(
                "vectorgate_query_latency_seconds",
                "End-to-end query latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
            &["kind"],
        )?;
        let target_failures = IntCounter::new(
            "vectorgate_target_failures_total",
            "Targets that failed or were skipped inside multi-target queries",
        )?;

        registry.register(Box::new(queries_total.clone()))?;
        registry.register(Box::new(query_latency.clone()))?;
        registry.register(Box::new(target_failures.clone()))?;

        Ok(Self {
            registry,
            queries_total,
            query_latency,
            target_failures,
        })
    }

    pub fn record_query(&self, kind: QueryKind, succeeded: bool, seconds: f64) {
        let outcome = if succeeded { "ok" } else { "error" };
        self.queries_total
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
        self.query_latency
            .with_label_values(&[kind.as_str()])
            .observe(seconds);
    }

    pub fn record_target_failures(&self, count: usize) {
        self.target_failures.inc_by(count as u64);
    }

    /// Prometheus text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
