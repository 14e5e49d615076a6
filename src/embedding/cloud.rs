//! Hosted embedding variant
//!
//! Calls a feature-extraction HTTP API (Hugging-Face-inference style:
//! `POST {base_url}/{model}` with `{"inputs": [...]}`, bearer-token auth).
//! Production deployments are subject to per-minute rate limits, so pacing
//! (a fixed delay after each batch call) is part of this variant's
//! contract rather than the caller's.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{EmbeddingProvider, ProviderError};

pub struct CloudEmbedProvider {
    client: reqwest::Client,
    endpoint: String,
    model_name: String,
    api_key: String,
    dimension: usize,
    pacing: Duration,
    timeout: Duration,
}

impl CloudEmbedProvider {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: String,
        dimension: usize,
        pacing: Duration,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), model),
            model_name: model.to_string(),
            api_key,
            dimension,
            pacing,
            timeout,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "inputs": texts }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::Generation(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Generation(format!("{status}: {body}")));
        }

        let embeddings: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| ProviderError::Generation(format!("malformed response: {e}")))?;

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(ProviderError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for CloudEmbedProvider {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty text".to_string()));
        }
        let mut embeddings = self.request(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| ProviderError::Generation("no embedding returned".to_string()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.request(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(ProviderError::Generation(format!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        // Rate-limit pacing after every batch round trip.
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn provider_for(server: &MockServer, dimension: usize) -> CloudEmbedProvider {
        CloudEmbedProvider::new(
            &server.base_url(),
            "sentence-transformers/all-MiniLM-L6-v2",
            "secret".to_string(),
            dimension,
            Duration::ZERO,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn embed_many_posts_inputs() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/sentence-transformers/all-MiniLM-L6-v2")
                    .header("Authorization", "Bearer secret")
                    .json_body(serde_json::json!({ "inputs": ["hello", "world"] }));
                then.status(200)
                    .json_body(serde_json::json!([[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]));
            })
            .await;

        let provider = provider_for(&server, 3);
        let embeddings = provider
            .embed_many(&["hello".to_string(), "world".to_string()])
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0], vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn rate_limit_maps_to_rate_limited() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).body("quota exceeded");
            })
            .await;

        let provider = provider_for(&server, 3);
        let err = provider.embed_one("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[tokio::test]
    async fn wrong_dimension_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(serde_json::json!([[0.1, 0.2]]));
            })
            .await;

        let provider = provider_for(&server, 3);
        let err = provider.embed_one("hello").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn backend_error_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).body("model loading");
            })
            .await;

        let provider = provider_for(&server, 3);
        let err = provider.embed_one("hello").await.unwrap_err();
        match err {
            ProviderError::Generation(message) => {
                assert!(message.contains("503"));
                assert!(message.contains("model loading"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
