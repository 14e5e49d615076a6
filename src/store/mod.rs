//! Vector store contract
//!
//! The pipeline does not mandate a specific vector database; it defines the
//! contract a store must satisfy: namespace-scoped upsert, metadata-filtered
//! similarity query, point fetch by id, and namespace delete-by-filter.
//! Namespaces are opaque string keys; filters are metadata equality
//! predicates.

mod memory;
mod rest;

pub use memory::MemoryVectorStore;
pub use rest::{RestStoreConfig, RestVectorStore};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the vector store backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend kind: "memory" (process-local, dev/tests) or "rest"
    pub backend: String,
    /// Index base URL (rest backend only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the store API key (rest backend only)
    pub api_key_env: String,
    /// Per-request timeout for the rest backend
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            base_url: None,
            api_key_env: "VECTOR_STORE_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Build the configured store backend. Called once at startup; the handle
/// is passed explicitly through the pipeline, never cached process-wide.
pub fn store_from_config(config: &StoreConfig) -> crate::error::Result<Arc<dyn VectorStore>> {
    use crate::error::VellumError;
    match config.backend.as_str() {
        "memory" => {
            tracing::warn!("memory store backend selected: data is process-local and not persisted");
            Ok(Arc::new(MemoryVectorStore::new()))
        }
        "rest" => {
            let base_url = config.base_url.clone().ok_or_else(|| {
                VellumError::Config("store.base_url is required for the rest backend".to_string())
            })?;
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                VellumError::Config(format!(
                    "environment variable {} is not set",
                    config.api_key_env
                ))
            })?;
            let store = RestVectorStore::new(RestStoreConfig {
                base_url,
                api_key,
                timeout: Duration::from_secs(config.timeout_secs),
            })?;
            Ok(Arc::new(store))
        }
        other => Err(VellumError::Config(format!(
            "store.backend must be 'memory' or 'rest', got '{other}'"
        ))),
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store rejected the operation: {0}")]
    Rejected(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Dimension mismatch in namespace '{namespace}': expected {expected}, got {actual}")]
    DimensionMismatch {
        namespace: String,
        expected: usize,
        actual: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Dimension mismatches indicate a namespace seeded with a different
    /// embedding provider; they are fatal and must never be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::DimensionMismatch { .. })
    }
}

/// Metadata persisted alongside every vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub text: String,
    pub tenant_id: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
}

/// A persisted point: unique id within its namespace, embedding values, and
/// metadata. Never mutated after creation; re-ingestion either overwrites by
/// identical id or is preceded by an explicit delete-by-filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A similarity match returned by [`VectorStore::query`].
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Metadata equality predicate, non-empty by construction.
///
/// "No filter" is expressed only as `Option::None` at the call site; an
/// empty filter object is unrepresentable, so a vacuous predicate can never
/// be conflated with "match everything" (or "match nothing", depending on
/// the backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    clauses: Vec<(String, String)>,
}

impl MetadataFilter {
    /// A filter with its first (required) equality clause.
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            clauses: vec![(field.into(), value.into())],
        }
    }

    /// Add another equality clause; all clauses must match.
    pub fn and(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Evaluate the predicate against record metadata. Unknown field names
    /// never match.
    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        self.clauses.iter().all(|(field, value)| {
            match field.as_str() {
                "tenant_id" => metadata.tenant_id == *value,
                "mode" => metadata.mode == *value,
                "subject_id" => metadata.subject_id.as_deref() == Some(value.as_str()),
                "text" => metadata.text == *value,
                _ => false,
            }
        })
    }

    /// Pinecone-style `{"field": {"$eq": value}}` representation for REST
    /// backends.
    pub fn to_query_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (field, value) in &self.clauses {
            object.insert(
                field.clone(),
                serde_json::json!({ "$eq": value }),
            );
        }
        serde_json::Value::Object(object)
    }
}

/// The store contract. Implementations must provide atomic per-record
/// upsert; the pipeline relies on no other write guarantee.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records in a namespace.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), StoreError>;

    /// Similarity query, ranked descending by score, bounded by `top_k`.
    /// `filter` of `None` means unfiltered; implementations must not send a
    /// vacuous filter object to their backend.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredMatch>, StoreError>;

    /// Fetch records by id; missing ids are simply absent from the result.
    async fn fetch(&self, namespace: &str, ids: &[String]) -> Result<Vec<VectorRecord>, StoreError>;

    /// Delete every record in the namespace matching the filter.
    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &MetadataFilter,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(tenant: &str) -> RecordMetadata {
        RecordMetadata {
            text: "some text".to_string(),
            tenant_id: tenant.to_string(),
            mode: "resume".to_string(),
            subject_id: None,
        }
    }

    #[test]
    fn filter_matches_equality() {
        let filter = MetadataFilter::equals("tenant_id", "u1");
        assert!(filter.matches(&metadata("u1")));
        assert!(!filter.matches(&metadata("u2")));
    }

    #[test]
    fn filter_clauses_are_anded() {
        let filter = MetadataFilter::equals("tenant_id", "u1").and("mode", "resume");
        assert!(filter.matches(&metadata("u1")));
        let filter = filter.and("mode", "qa");
        assert!(!filter.matches(&metadata("u1")));
    }

    #[test]
    fn unknown_field_never_matches() {
        let filter = MetadataFilter::equals("owner", "u1");
        assert!(!filter.matches(&metadata("u1")));
    }

    #[test]
    fn query_json_uses_eq_operators() {
        let filter = MetadataFilter::equals("tenant_id", "u1");
        assert_eq!(
            filter.to_query_json(),
            serde_json::json!({ "tenant_id": { "$eq": "u1" } })
        );
    }
}
