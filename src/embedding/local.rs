//! Local in-process embedding variant
//!
//! Wraps a fastembed model for development deployments: no network egress,
//! models downloaded to the local cache on first use. Model inference is
//! blocking, so calls are moved off the async runtime with `spawn_blocking`.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::{EmbeddingProvider, ProviderError};

pub struct LocalEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl LocalEmbedProvider {
    /// Create a local provider for the named model.
    ///
    /// Models are downloaded on demand to `~/.cache/huggingface/` on first
    /// use; the default all-MiniLM-L6-v2 is ~90MB at 384 dimensions.
    pub fn new(model_name: &str) -> Result<Self, ProviderError> {
        let embedding_model = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            _ => {
                return Err(ProviderError::Initialization(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        let dimension = match embedding_model {
            EmbeddingModel::BGEBaseENV15 => 768,
            _ => 384,
        };

        tracing::info!(
            "Initializing local embedding model: {} ({}D)",
            model_name,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);
        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ProviderError> {
        let model = Arc::clone(&self.model);
        let embeddings = tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| ProviderError::Generation(format!("embedding task failed: {e}")))?
            .map_err(|e| ProviderError::Generation(e.to_string()))?;

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
impl EmbeddingProvider for LocalEmbedProvider {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty text".to_string()));
        }
        let mut embeddings = self.embed_blocking(vec![text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| ProviderError::Generation("no embedding generated".to_string()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(ProviderError::InvalidInput(
                "batch contains empty text".to_string(),
            ));
        }
        let embeddings = self.embed_blocking(texts.to_vec()).await?;
        if embeddings.len() != texts.len() {
            return Err(ProviderError::Generation(format!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                embeddings.len()
            )));
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

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn provider_creation() {
        let provider = LocalEmbedProvider::new("all-MiniLM-L6-v2").unwrap();
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn unsupported_model_is_rejected() {
        let result = LocalEmbedProvider::new("definitely-not-a-model");
        assert!(matches!(result, Err(ProviderError::Initialization(_))));
    }

    #[tokio::test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    async fn single_embedding_has_model_dimension() {
        let provider = LocalEmbedProvider::new("all-MiniLM-L6-v2").unwrap();
        let embedding = provider
            .embed_one("This is a test sentence for embedding.")
            .await
            .unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
