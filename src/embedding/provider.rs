//! Embedding provider trait and shared error type

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Model initialization failed: {0}")]
    Initialization(String),

    #[error("Embedding generation failed: {0}")]
    Generation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limited by embedding backend: {0}")]
    RateLimited(String),

    #[error("Embedding call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl ProviderError {
    /// A dimension mismatch means the configured provider disagrees with
    /// what a namespace was seeded with; fatal, never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProviderError::DimensionMismatch { .. })
    }
}

/// Trait for embedding providers
///
/// A failure for a given text is reported per call, not per ingestion: the
/// batch upserter isolates the offending text and continues, so providers
/// should return an error rather than panic on malformed input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Generate embeddings for multiple texts in one backend round trip
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Fixed output dimension of this provider
    fn dimension(&self) -> usize;

    /// Model identifier, for logs and diagnostics
    fn model_name(&self) -> &str;
}

/// Deterministic bag-of-tokens embedder for tests and offline smoke runs.
///
/// Each whitespace token hashes to one slot of the vector, so texts sharing
/// vocabulary land near each other under cosine similarity while staying
/// fully deterministic. `fail_contains` injects a per-text failure for
/// exercising the batch-then-item fallback path.
pub struct MockEmbedProvider {
    dimension: usize,
    fail_contains: Option<String>,
}

impl MockEmbedProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_contains: None,
        }
    }

    /// Fail any embedding whose text contains `marker`.
    pub fn with_failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.fail_contains = Some(marker.into());
        self
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if let Some(marker) = &self.fail_contains {
            if text.contains(marker.as_str()) {
                return Err(ProviderError::Generation(format!(
                    "injected failure for text containing '{marker}'"
                )));
            }
        }
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty text".to_string()));
        }

        let mut values = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let slot = (fnv1a(token.as_bytes()) as usize) % self.dimension;
            values[slot] += 1.0;
        }
        let magnitude: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut values {
                *v /= magnitude;
            }
        }
        Ok(values)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for MockEmbedProvider {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_text(text)
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-bag-of-tokens"
    }
}
