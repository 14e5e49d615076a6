//! Resilient batched embed-and-upsert
//!
//! One explicit two-tier policy instead of inline retry nests: each batch is
//! embedded in a single provider round trip and written in a single store
//! call; if either fails, every record in the batch is retried individually
//! so one anomalous chunk cannot sink its neighbors. Items that also fail
//! alone are recorded and skipped; ingestion continues with the remaining
//! batches and reports partial coverage instead of aborting.

use std::time::Duration;

use tracing::{debug, warn};

use crate::embedding::{EmbeddingProvider, ProviderError};
use crate::error::{Result, VellumError};
use crate::store::{RecordMetadata, StoreError, VectorRecord, VectorStore};

/// A chunk waiting to be embedded and persisted.
#[derive(Debug, Clone)]
pub struct PendingRecord {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// Result of one upsert run. `failed_ids` lists records that failed both the
/// batch attempt and their individual retry.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    pub upserted: usize,
    pub failed_ids: Vec<String>,
}

pub struct BatchUpserter<'a> {
    provider: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
    batch_size: usize,
    call_timeout: Duration,
}

impl<'a> BatchUpserter<'a> {
    pub fn new(
        provider: &'a dyn EmbeddingProvider,
        store: &'a dyn VectorStore,
        batch_size: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            batch_size: batch_size.max(1),
            call_timeout,
        }
    }

    /// Embed and persist `records` into `namespace`.
    ///
    /// Batches run sequentially: a batch and its per-item fallback fully
    /// resolve before the next batch starts, keeping id ordering
    /// deterministic. Only a dimension mismatch aborts the run.
    pub async fn run(&self, namespace: &str, records: &[PendingRecord]) -> Result<UpsertOutcome> {
        let mut outcome = UpsertOutcome::default();

        for batch in records.chunks(self.batch_size) {
            match self.try_batch(namespace, batch).await {
                Ok(count) => {
                    outcome.upserted += count;
                    debug!(namespace, count, "batch upserted");
                }
                Err(err) if is_fatal(&err) => return Err(err),
                Err(err) => {
                    warn!(
                        namespace,
                        batch_len = batch.len(),
                        error = %err,
                        "batch failed, retrying records individually"
                    );
                    self.item_fallback(namespace, batch, &mut outcome).await?;
                }
            }
        }

        Ok(outcome)
    }

    /// Tier one: one embed round trip, one store write.
    async fn try_batch(&self, namespace: &str, batch: &[PendingRecord]) -> Result<usize> {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let vectors = self
            .embed_with_timeout(&texts)
            .await
            .map_err(|e| promote(namespace, e))?;

        let records: Vec<VectorRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(pending, values)| VectorRecord {
                id: pending.id.clone(),
                values,
                metadata: pending.metadata.clone(),
            })
            .collect();

        let count = records.len();
        self.upsert_with_timeout(namespace, records)
            .await
            .map_err(|e| promote(namespace, e))?;
        Ok(count)
    }

    /// Tier two: isolate each record so one bad chunk cannot fail the rest.
    async fn item_fallback(
        &self,
        namespace: &str,
        batch: &[PendingRecord],
        outcome: &mut UpsertOutcome,
    ) -> Result<()> {
        for pending in batch {
            let attempt = async {
                let vector = self.embed_one_with_timeout(&pending.text).await?;
                self.upsert_with_timeout(
                    namespace,
                    vec![VectorRecord {
                        id: pending.id.clone(),
                        values: vector,
                        metadata: pending.metadata.clone(),
                    }],
                )
                .await
            };
            match attempt.await {
                Ok(()) => outcome.upserted += 1,
                Err(err) => {
                    let err = promote(namespace, err);
                    if is_fatal(&err) {
                        return Err(err);
                    }
                    warn!(namespace, id = %pending.id, error = %err, "record failed individually, skipping");
                    outcome.failed_ids.push(pending.id.clone());
                }
            }
        }
        Ok(())
    }

    async fn embed_with_timeout(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match tokio::time::timeout(self.call_timeout, self.provider.embed_many(texts)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderError::Timeout(self.call_timeout).into()),
        }
    }

    async fn embed_one_with_timeout(&self, text: &str) -> Result<Vec<f32>> {
        match tokio::time::timeout(self.call_timeout, self.provider.embed_one(text)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderError::Timeout(self.call_timeout).into()),
        }
    }

    async fn upsert_with_timeout(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        match tokio::time::timeout(self.call_timeout, self.store.upsert(namespace, records)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(self.call_timeout).into()),
        }
    }
}

/// Escalate provider/store dimension mismatches to the pipeline-level fatal
/// variant; everything else passes through to the isolation path.
fn promote(namespace: &str, err: VellumError) -> VellumError {
    match err {
        VellumError::Provider(ProviderError::DimensionMismatch { expected, actual }) => {
            VellumError::DimensionMismatch {
                namespace: namespace.to_string(),
                expected,
                actual,
            }
        }
        VellumError::Store(StoreError::DimensionMismatch {
            namespace,
            expected,
            actual,
        }) => VellumError::DimensionMismatch {
            namespace,
            expected,
            actual,
        },
        other => other,
    }
}

fn is_fatal(err: &VellumError) -> bool {
    matches!(err, VellumError::DimensionMismatch { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedProvider;
    use crate::store::{MemoryVectorStore, MetadataFilter, ScoredMatch};
    use async_trait::async_trait;

    fn pending(id: &str, text: &str) -> PendingRecord {
        PendingRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata: RecordMetadata {
                text: text.to_string(),
                tenant_id: "u1".to_string(),
                mode: "qa".to_string(),
                subject_id: None,
            },
        }
    }

    #[tokio::test]
    async fn upserts_all_records_in_batches() {
        let provider = MockEmbedProvider::new(16);
        let store = MemoryVectorStore::new();
        let upserter = BatchUpserter::new(&provider, &store, 2, Duration::from_secs(5));

        let records: Vec<PendingRecord> = (0..5)
            .map(|i| pending(&format!("qa_u1_chunk_{i}"), &format!("passage number {i}")))
            .collect();
        let outcome = upserter.run("global-qa", &records).await.unwrap();

        assert_eq!(outcome.upserted, 5);
        assert!(outcome.failed_ids.is_empty());
        assert_eq!(store.namespace_len("global-qa").await, 5);
    }

    #[tokio::test]
    async fn poisoned_record_is_isolated_not_fatal() {
        let provider = MockEmbedProvider::new(16).with_failure_marker("POISON");
        let store = MemoryVectorStore::new();
        let upserter = BatchUpserter::new(&provider, &store, 3, Duration::from_secs(5));

        let records = vec![
            pending("qa_u1_chunk_0", "fine passage zero"),
            pending("qa_u1_chunk_1", "POISON makes this one fail"),
            pending("qa_u1_chunk_2", "fine passage two"),
            pending("qa_u1_chunk_3", "fine passage three"),
        ];
        let outcome = upserter.run("global-qa", &records).await.unwrap();

        assert_eq!(outcome.upserted, 3);
        assert_eq!(outcome.failed_ids, vec!["qa_u1_chunk_1".to_string()]);
        assert_eq!(store.namespace_len("global-qa").await, 3);
    }

    /// Store that rejects multi-record writes, forcing the per-item tier.
    struct BatchRejectingStore {
        inner: MemoryVectorStore,
    }

    #[async_trait]
    impl VectorStore for BatchRejectingStore {
        async fn upsert(
            &self,
            namespace: &str,
            records: Vec<VectorRecord>,
        ) -> std::result::Result<(), StoreError> {
            if records.len() > 1 {
                return Err(StoreError::Rejected("batch too large".to_string()));
            }
            self.inner.upsert(namespace, records).await
        }

        async fn query(
            &self,
            namespace: &str,
            vector: &[f32],
            top_k: usize,
            filter: Option<&MetadataFilter>,
        ) -> std::result::Result<Vec<ScoredMatch>, StoreError> {
            self.inner.query(namespace, vector, top_k, filter).await
        }

        async fn fetch(
            &self,
            namespace: &str,
            ids: &[String],
        ) -> std::result::Result<Vec<VectorRecord>, StoreError> {
            self.inner.fetch(namespace, ids).await
        }

        async fn delete_by_filter(
            &self,
            namespace: &str,
            filter: &MetadataFilter,
        ) -> std::result::Result<(), StoreError> {
            self.inner.delete_by_filter(namespace, filter).await
        }
    }

    #[tokio::test]
    async fn store_batch_failure_falls_back_to_items() {
        let provider = MockEmbedProvider::new(16);
        let store = BatchRejectingStore {
            inner: MemoryVectorStore::new(),
        };
        let upserter = BatchUpserter::new(&provider, &store, 4, Duration::from_secs(5));

        let records: Vec<PendingRecord> = (0..4)
            .map(|i| pending(&format!("qa_u1_chunk_{i}"), &format!("passage {i}")))
            .collect();
        let outcome = upserter.run("global-qa", &records).await.unwrap();

        assert_eq!(outcome.upserted, 4);
        assert!(outcome.failed_ids.is_empty());
        assert_eq!(store.inner.namespace_len("global-qa").await, 4);
    }

    #[tokio::test]
    async fn dimension_mismatch_aborts_the_run() {
        let provider = MockEmbedProvider::new(4);
        let store = MemoryVectorStore::new();
        // Seed the namespace with a different dimensionality.
        store
            .upsert(
                "global-qa",
                vec![VectorRecord {
                    id: "seeded".to_string(),
                    values: vec![1.0, 0.0],
                    metadata: RecordMetadata {
                        text: "seed".to_string(),
                        tenant_id: "u1".to_string(),
                        mode: "qa".to_string(),
                        subject_id: None,
                    },
                }],
            )
            .await
            .unwrap();

        let upserter = BatchUpserter::new(&provider, &store, 2, Duration::from_secs(5));
        let err = upserter
            .run("global-qa", &[pending("qa_u1_chunk_0", "some passage")])
            .await
            .unwrap_err();
        assert!(matches!(err, VellumError::DimensionMismatch { .. }));
    }
}
