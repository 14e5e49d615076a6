//! Query-time retrieval
//!
//! Embeds a question with the same provider variant that ingested the
//! namespace (querying with a different provider silently returns
//! garbage-ranked results, so one deployment configures exactly one) and
//! runs a tenant-scoped similarity query. For identity- and tenant-scoped
//! modes the tenant security filter is mandatory and derived here, never
//! left to callers to remember.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::embedding::{EmbeddingProvider, ProviderError};
use crate::error::{Result, VellumError};
use crate::partition::{resolve_partition, IngestMode, PartitionKey, ReingestPolicy};
use crate::store::{MetadataFilter, RecordMetadata, StoreError, VectorStore};

/// A ranked passage with provenance, produced per query.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub text: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    pub top_k: usize,
    pub call_timeout: Duration,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// The security filter a scope requires: shared domains are queried
/// unfiltered (`None`, the only "no filter" sentinel), everything else is
/// pinned to the calling tenant. Omitting the tenant filter on a shared
/// identity namespace is a security defect, not a style choice.
pub fn security_filter(mode: &IngestMode, tenant_id: &str) -> Option<MetadataFilter> {
    if mode.is_shared() {
        None
    } else {
        Some(MetadataFilter::equals("tenant_id", tenant_id.trim()))
    }
}

pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    options: RetrieverOptions,
}

impl Retriever {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        options: RetrieverOptions,
    ) -> Self {
        Self {
            provider,
            store,
            options,
        }
    }

    pub fn top_k(&self) -> usize {
        self.options.top_k
    }

    /// Retrieve the `top_k` most similar passages for `question` from the
    /// resolved partition, ranked descending by score.
    pub async fn retrieve(
        &self,
        question: &str,
        partition: &PartitionKey,
        security: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        if question.trim().is_empty() {
            return Err(VellumError::Validation(
                "question must not be empty".to_string(),
            ));
        }

        let vector = match tokio::time::timeout(
            self.options.call_timeout,
            self.provider.embed_one(question),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::Timeout(self.options.call_timeout).into()),
        };

        let matches = match tokio::time::timeout(
            self.options.call_timeout,
            self.store
                .query(&partition.namespace, &vector, top_k, security),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(StoreError::Timeout(self.options.call_timeout).into()),
        };

        let mut passages: Vec<RetrievedPassage> = matches
            .into_iter()
            .map(|m| RetrievedPassage {
                text: m.metadata.text.clone(),
                score: m.score,
                metadata: m.metadata,
            })
            .collect();
        passages.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(passages)
    }

    /// Resolve the partition and mandatory security filter from intent, then
    /// retrieve with the configured `top_k`.
    pub async fn retrieve_scoped(
        &self,
        question: &str,
        mode: &IngestMode,
        tenant_id: &str,
        subject_id: Option<&str>,
    ) -> Result<Vec<RetrievedPassage>> {
        // Queries always address the canonical (non-timestamped) prefix;
        // the reingest policy only shapes write-side ids.
        let partition = resolve_partition(mode, tenant_id, subject_id, ReingestPolicy::Overwrite)?;
        let filter = security_filter(mode, tenant_id);
        self.retrieve(question, &partition, filter.as_ref(), self.options.top_k)
            .await
    }

    /// Fetch the well-known first chunk of a shared-domain document to
    /// surface its identity (title, author) even when it would not rank in
    /// the top-k. Failure is non-fatal; the anchor is simply omitted.
    pub async fn fetch_anchor(&self, partition: &PartitionKey) -> Option<String> {
        match self
            .store
            .fetch(&partition.namespace, &[partition.anchor_id()])
            .await
        {
            Ok(records) => records.into_iter().next().map(|r| r.metadata.text),
            Err(err) => {
                debug!(namespace = %partition.namespace, error = %err, "anchor fetch failed");
                None
            }
        }
    }
}
