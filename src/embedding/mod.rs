//! Embedding generation
//!
//! One [`EmbeddingProvider`] trait, two deployment variants: a local
//! in-process model for development (no network egress) and a hosted HTTP
//! API for production. The variant is selected once at startup from
//! configuration, never by inspecting provider objects at runtime.
//! Querying a namespace with a different provider than ingested it returns
//! garbage-ranked results, so one deployment uses exactly one variant.

mod cloud;
mod local;
mod provider;

pub use cloud::CloudEmbedProvider;
pub use local::LocalEmbedProvider;
pub use provider::{EmbeddingProvider, MockEmbedProvider, ProviderError};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VellumError};

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Deployment variant: "local" or "cloud"
    pub mode: String,
    /// Model name (local: fastembed model id; cloud: hosted model path)
    pub model: String,
    /// Embedding dimension; must match what the model produces
    pub dimension: usize,
    /// Number of texts embedded per provider round trip
    pub batch_size: usize,
    /// Fixed delay applied after each cloud batch call, for rate-limit
    /// pacing. Zero disables pacing.
    pub pacing_ms: u64,
    /// Per-request timeout for the cloud HTTP client
    pub timeout_secs: u64,
    /// Base URL of the hosted embedding API (cloud mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the hosted API key (cloud mode only)
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: "local".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            batch_size: 32,
            pacing_ms: 0,
            timeout_secs: 30,
            base_url: None,
            api_key_env: "EMBEDDING_API_KEY".to_string(),
        }
    }
}

/// Build the configured provider variant. Called once at startup; the
/// resulting handle is passed explicitly through the pipeline.
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.mode.as_str() {
        "local" => Ok(Arc::new(LocalEmbedProvider::new(&config.model)?)),
        "cloud" => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                VellumError::Config("embedding.base_url is required in cloud mode".to_string())
            })?;
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                VellumError::Config(format!(
                    "environment variable {} is not set",
                    config.api_key_env
                ))
            })?;
            Ok(Arc::new(CloudEmbedProvider::new(
                base_url,
                &config.model,
                api_key,
                config.dimension,
                std::time::Duration::from_millis(config.pacing_ms),
                std::time::Duration::from_secs(config.timeout_secs),
            )?))
        }
        other => Err(VellumError::Config(format!(
            "embedding.mode must be 'local' or 'cloud', got '{other}'"
        ))),
    }
}
