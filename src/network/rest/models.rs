// Copyright 2025 Vijaykumar Singh
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Request and response bodies of the REST API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{QueryVector, SearchOptions, SearchParams, TargetId};
use crate::registry::{ConnectionRecord, ConnectionStatus};

/// Form body of the login endpoints
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Connection as returned to clients; the password never leaves the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionView {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub description: Option<String>,
    pub status: ConnectionStatus,
    pub created_by: String,
}

impl From<&ConnectionRecord> for ConnectionView {
    fn from(record: &ConnectionRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            host: record.host.clone(),
            port: record.port,
            username: record.username.clone(),
            description: record.description.clone(),
            status: record.status,
            created_by: record.created_by.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct VectorQueryRequest {
    #[serde(alias = "database_id")]
    pub target_id: TargetId,
    pub collection_name: String,
    pub vector_data: QueryVector,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub search_params: Option<SearchParams>,
    #[serde(default)]
    pub output_fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct MultiQueryRequest {
    #[serde(alias = "database_ids")]
    pub target_ids: Vec<TargetId>,
    pub collection_names: HashMap<TargetId, String>,
    pub vector_data: QueryVector,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub search_params: Option<SearchParams>,
    #[serde(default)]
    pub output_fields: Option<Vec<String>>,
}

pub fn search_options(
    top_k: Option<usize>,
    search_params: Option<SearchParams>,
    output_fields: Option<Vec<String>>,
    default_top_k: usize,
) -> SearchOptions {
    SearchOptions {
        top_k: top_k.unwrap_or(default_top_k),
        search_params,
        output_fields,
    }
}

impl VectorQueryRequest {
    pub fn options(&self, default_top_k: usize) -> SearchOptions {
        search_options(
            self.top_k,
            self.search_params.clone(),
            self.output_fields.clone(),
            default_top_k,
        )
    }
}

impl MultiQueryRequest {
    pub fn options(&self, default_top_k: usize) -> SearchOptions {
        search_options(
            self.top_k,
            self.search_params.clone(),
            self.output_fields.clone(),
            default_top_k,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_id_alias_accepted() {
        let body = r#"{"database_id": "c1", "collection_name": "docs", "vector_data": [0.1, 0.2]}"#;
        let request: VectorQueryRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.target_id, "c1");
        assert_eq!(request.options(10).top_k, 10);

        let body = r#"{"database_ids": ["a", "b"], "collection_names": {"a": "x"}, "vector_data": [[1.0]], "top_k": 3}"#;
        let request: MultiQueryRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.target_ids, vec!["a", "b"]);
        assert_eq!(request.options(10).top_k, 3);
    }
}
