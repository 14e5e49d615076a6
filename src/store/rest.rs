//! REST vector store client
//!
//! Data-plane client for Pinecone-compatible vector databases: namespaced
//! `vectors/upsert`, `query`, `vectors/fetch` and `vectors/delete`
//! endpoints authenticated with an `Api-Key` header. This is the production
//! backend; [`super::MemoryVectorStore`] covers development and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;

use super::{MetadataFilter, RecordMetadata, ScoredMatch, StoreError, VectorRecord, VectorStore};

/// Connection settings for a REST vector store.
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Index base URL, e.g. `https://my-index-abc123.svc.pinecone.io`.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

pub struct RestVectorStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

static DIMENSION_NUMBERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

impl RestVectorStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            timeout: config.timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }

    /// Classify a non-success response. Backends report an index seeded with
    /// a different dimensionality as a 4xx whose message names both
    /// dimensions; that case is fatal and must not be retried.
    fn rejection(namespace: &str, status: reqwest::StatusCode, body: String) -> StoreError {
        if body.to_ascii_lowercase().contains("dimension") {
            let mut numbers = DIMENSION_NUMBERS
                .find_iter(&body)
                .filter_map(|m| m.as_str().parse::<usize>().ok());
            if let (Some(actual), Some(expected)) = (numbers.next(), numbers.next()) {
                return StoreError::DimensionMismatch {
                    namespace: namespace.to_string(),
                    expected,
                    actual,
                };
            }
        }
        StoreError::Rejected(format!("{status}: {body}"))
    }

    async fn check(
        namespace: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::rejection(namespace, status, body))
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ApiMatch>,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: RecordMetadata,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, ApiVector>,
}

#[derive(Debug, Deserialize)]
struct ApiVector {
    id: String,
    #[serde(default)]
    values: Vec<f32>,
    metadata: RecordMetadata,
}

#[async_trait]
impl VectorStore for RestVectorStore {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .post(self.endpoint("vectors/upsert"))
            .header("Api-Key", &self.api_key)
            .json(&json!({ "namespace": namespace, "vectors": records }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check(namespace, response).await?;
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredMatch>, StoreError> {
        let mut body = json!({
            "namespace": namespace,
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        // The filter key is attached only when a predicate exists; an empty
        // filter object means "match nothing" on some backends.
        if let Some(filter) = filter {
            body["filter"] = filter.to_query_json();
        }

        let response = self
            .client
            .post(self.endpoint("query"))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = Self::check(namespace, response).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut matches: Vec<ScoredMatch> = parsed
            .matches
            .into_iter()
            .map(|m| ScoredMatch {
                id: m.id,
                score: m.score.clamp(0.0, 1.0),
                metadata: m.metadata,
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn fetch(
        &self,
        namespace: &str,
        ids: &[String],
    ) -> Result<Vec<VectorRecord>, StoreError> {
        let mut params: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        params.push(("namespace", namespace));

        let response = self
            .client
            .get(self.endpoint("vectors/fetch"))
            .header("Api-Key", &self.api_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = Self::check(namespace, response).await?;
        let parsed: FetchResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(parsed
            .vectors
            .into_values()
            .map(|v| VectorRecord {
                id: v.id,
                values: v.values,
                metadata: v.metadata,
            })
            .collect())
    }

    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &MetadataFilter,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.endpoint("vectors/delete"))
            .header("Api-Key", &self.api_key)
            .json(&json!({ "namespace": namespace, "filter": filter.to_query_json() }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check(namespace, response).await?;
        Ok(())
    }
}
