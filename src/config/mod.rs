//! Configuration management
//!
//! Loading, validation, and profile handling for the pipeline. One TOML
//! file selects the embedding variant, store backend, chunking geometry,
//! and retrieval tunables; named profiles switch whole deployments
//! ("development" = local embeddings + memory store, "production" = cloud
//! embeddings + rest store) without editing individual keys.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::embedding::EmbeddingConfig;
use crate::error::{Result, VellumError};
use crate::ingest::IngestOptions;
use crate::partition::ReingestPolicy;
use crate::retrieval::RetrieverOptions;
use crate::store::StoreConfig;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Chunking geometry. Smaller values reduce the risk of exceeding an
/// embedding provider's input ceiling at the cost of more round trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub target_size: usize,
    pub overlap: usize,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Result count bound per query
    pub top_k: usize,
    /// Most recent conversation turns included in the prompt
    pub history_limit: usize,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Re-ingestion id policy: "overwrite" or "timestamp"
    pub reingest: ReingestPolicy,
    /// Bound on every external call (embedding provider, vector store)
    pub call_timeout_secs: u64,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_backend: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VellumError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| VellumError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| VellumError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile);
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) {
        if let Some(overrides) = self.profiles.get(profile) {
            if let Some(mode) = &overrides.embedding_mode {
                self.embedding.mode = mode.clone();
            }
            if let Some(model) = &overrides.embedding_model {
                self.embedding.model = model.clone();
            }
            if let Some(backend) = &overrides.store_backend {
                self.store.backend = backend.clone();
            }
        }
    }

    /// Apply environment variable overrides
    /// Environment variables in format: VELLUM_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("VELLUM_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__MODE" => {
                self.embedding.mode = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BASE_URL" => {
                self.embedding.base_url = Some(value.to_string());
            }
            "STORE__BACKEND" => {
                self.store.backend = value.to_string();
            }
            "STORE__BASE_URL" => {
                self.store.base_url = Some(value.to_string());
            }
            "INGEST__REINGEST" => {
                self.ingest.reingest = match value {
                    "overwrite" => ReingestPolicy::Overwrite,
                    "timestamp" => ReingestPolicy::TimestampSuffix,
                    _ => {
                        return Err(VellumError::InvalidConfigValue {
                            path: path.to_string(),
                            message: format!("Cannot parse '{}' as reingest policy", value),
                        })
                    }
                };
            }
            "RETRIEVAL__TOP_K" => {
                self.retrieval.top_k =
                    value.parse().map_err(|_| VellumError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| VellumError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("vellum").join("config.toml"))
    }

    /// Options consumed by [`crate::ingest::Ingestor`]
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            target_size: self.chunking.target_size,
            overlap: self.chunking.overlap,
            batch_size: self.embedding.batch_size,
            call_timeout: Duration::from_secs(self.ingest.call_timeout_secs),
            reingest: self.ingest.reingest,
        }
    }

    /// Options consumed by [`crate::retrieval::Retriever`]
    pub fn retriever_options(&self) -> RetrieverOptions {
        RetrieverOptions {
            top_k: self.retrieval.top_k,
            call_timeout: Duration::from_secs(self.ingest.call_timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "development".to_string(),
            ProfileOverrides {
                embedding_mode: Some("local".to_string()),
                embedding_model: None,
                store_backend: Some("memory".to_string()),
            },
        );
        profiles.insert(
            "production".to_string(),
            ProfileOverrides {
                embedding_mode: Some("cloud".to_string()),
                embedding_model: Some("sentence-transformers/all-MiniLM-L6-v2".to_string()),
                store_backend: Some("rest".to_string()),
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            chunking: ChunkingConfig {
                target_size: 400,
                overlap: 100,
            },
            retrieval: RetrievalConfig {
                top_k: 4,
                history_limit: 6,
            },
            ingest: IngestConfig {
                reingest: ReingestPolicy::Overwrite,
                call_timeout_secs: 30,
            },
            profiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_round_trips_through_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let config = Config::default();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.chunking.target_size, 400);
        assert_eq!(loaded.chunking.overlap, 100);
        assert_eq!(loaded.retrieval.top_k, 4);
        assert_eq!(loaded.embedding.mode, "local");
    }

    #[test]
    fn missing_file_is_a_config_not_found_error() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, VellumError::ConfigNotFound { .. }));
    }

    #[test]
    fn production_profile_switches_both_variants() {
        let mut config = Config::default();
        config.apply_profile("production");
        assert_eq!(config.embedding.mode, "cloud");
        assert_eq!(config.store.backend, "rest");
    }

    #[test]
    fn ingest_options_carry_chunking_geometry() {
        let config = Config::default();
        let options = config.ingest_options();
        assert_eq!(options.target_size, 400);
        assert_eq!(options.overlap, 100);
        assert_eq!(options.batch_size, config.embedding.batch_size);
    }
}
