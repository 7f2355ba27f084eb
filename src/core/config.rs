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

//! Server configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `auth.secret_key`
pub const SECRET_KEY_ENV: &str = "VECTORGATE_SECRET_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthSettings,
    pub query: QueryConfig,
    pub backend: BackendConfig,
    pub monitoring: MonitoringConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON document holding users and connections. Defaults to
    /// `<data_dir>/database.json` when unset.
    pub registry_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub secret_key: String,
    pub token_expire_minutes: i64,
    pub bcrypt_cost: u32,
    pub bootstrap_admin_username: String,
    pub bootstrap_admin_password: String,
    pub bootstrap_admin_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    /// Upper bound on a single target's query, connect included
    pub target_timeout_ms: u64,
    pub parallel_fanout: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub request_timeout_ms: u64,
    /// Vector field searched in every collection
    pub anns_field: String,
    pub db_name: String,
    /// Use https when a connection carries a username
    pub tls_with_credentials: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub metrics_enabled: bool,
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: "change-me-in-production".to_string(),
            token_expire_minutes: 60 * 24 * 7,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            bootstrap_admin_username: "admin".to_string(),
            bootstrap_admin_password: "admin123".to_string(),
            bootstrap_admin_email: Some("admin@example.com".to_string()),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            max_top_k: 16384,
            target_timeout_ms: 30_000,
            parallel_fanout: true,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            anns_field: "emb".to_string(),
            db_name: "default".to_string(),
            tls_with_credentials: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&raw)?
        } else {
            tracing::info!("Configuration file {:?} not found, using defaults", path);
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_KEY_ENV) {
            if !secret.is_empty() {
                self.auth.secret_key = secret;
            }
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.storage
            .registry_path
            .clone()
            .unwrap_or_else(|| self.server.data_dir.join("database.json"))
    }
}

impl QueryConfig {
    pub fn target_timeout(&self) -> Duration {
        Duration::from_millis(self.target_timeout_ms)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            [server]
            port = 9100

            [query]
            parallel_fanout = false
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert!(!config.query.parallel_fanout);
        assert_eq!(config.query.default_top_k, 10);
        assert_eq!(config.backend.anns_field, "emb");
    }

    #[test]
    fn test_registry_path_defaults_under_data_dir() {
        let mut config = Config::default();
        config.server.data_dir = PathBuf::from("/var/lib/vectorgate");
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/var/lib/vectorgate/database.json")
        );

        config.storage.registry_path = Some(PathBuf::from("/tmp/registry.json"));
        assert_eq!(config.registry_path(), PathBuf::from("/tmp/registry.json"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.token_expire_minutes, 10080);
    }
}
