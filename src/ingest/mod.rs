//! Ingestion orchestration
//!
//! Composes chunking, partition resolution, embedding, and the batched
//! upsert into one idempotent operation: NORMALIZE → IDENTITY_CLEANUP (for
//! identity-scoped modes) → CHUNK → EMBED_AND_UPSERT. Ingestion is
//! I/O-bound and usually runs as a background task decoupled from the
//! triggering request; [`Ingestor::spawn`] reports completion through logs
//! only and runs to completion even if the caller goes away.

mod upsert;

pub use upsert::{BatchUpserter, PendingRecord, UpsertOutcome};

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::chunking;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, VellumError};
use crate::partition::{resolve_partition, IngestMode, ReingestPolicy};
use crate::store::{MetadataFilter, RecordMetadata, VectorStore};

/// One document to ingest, with the intent that scopes it.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub text: String,
    pub tenant_id: String,
    pub mode: IngestMode,
    pub subject_id: Option<String>,
}

/// Outcome of a completed ingestion. Partial failures are reported, not
/// raised: `failed_ids` lets operators re-run targeted cleanup.
#[derive(Debug)]
pub struct IngestReceipt {
    pub namespace: String,
    pub chunk_count: usize,
    pub upserted: usize,
    pub failed_ids: Vec<String>,
}

/// Tunables carried from configuration.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub target_size: usize,
    pub overlap: usize,
    pub batch_size: usize,
    pub call_timeout: Duration,
    pub reingest: ReingestPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            target_size: 400,
            overlap: 100,
            batch_size: 32,
            call_timeout: Duration::from_secs(30),
            reingest: ReingestPolicy::Overwrite,
        }
    }
}

/// The ingestion pipeline. Holds the resolved provider and store handles
/// explicitly; there is no process-wide store singleton.
pub struct Ingestor {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            provider,
            store,
            options,
        }
    }

    /// Ingest one document.
    ///
    /// Identical `(tenant, mode, subject, text)` inputs are idempotent:
    /// ordinal-based ids overwrite in place under
    /// [`ReingestPolicy::Overwrite`], and identity-scoped modes replace the
    /// tenant's previous upload through the cleanup step.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReceipt> {
        let normalized = chunking::normalize(&request.text);
        if normalized.is_empty() {
            return Err(VellumError::Validation(
                "document is empty after normalization".to_string(),
            ));
        }

        let partition = resolve_partition(
            &request.mode,
            &request.tenant_id,
            request.subject_id.as_deref(),
            self.options.reingest,
        )?;

        // A repeat upload fully replaces the previous document for
        // identity-scoped content. Cleanup failure must never block the
        // write: a first-time upload has nothing to clean.
        if request.mode.is_identity_scoped() {
            let filter = MetadataFilter::equals("tenant_id", request.tenant_id.trim());
            if let Err(err) = self
                .store
                .delete_by_filter(&partition.namespace, &filter)
                .await
            {
                warn!(
                    namespace = %partition.namespace,
                    tenant = %request.tenant_id,
                    error = %err,
                    "identity cleanup failed, continuing with write"
                );
            }
        }

        let chunks = chunking::chunk(&normalized, self.options.target_size, self.options.overlap);
        let chunk_count = chunks.len();
        info!(
            namespace = %partition.namespace,
            chunks = chunk_count,
            model = self.provider.model_name(),
            "ingesting document"
        );

        let records: Vec<PendingRecord> = chunks
            .into_iter()
            .map(|chunk| PendingRecord {
                id: partition.record_id(chunk.ordinal),
                metadata: RecordMetadata {
                    text: chunk.text.clone(),
                    tenant_id: request.tenant_id.trim().to_string(),
                    mode: request.mode.as_str().to_string(),
                    subject_id: request.subject_id.clone(),
                },
                text: chunk.text,
            })
            .collect();

        let upserter = BatchUpserter::new(
            self.provider.as_ref(),
            self.store.as_ref(),
            self.options.batch_size,
            self.options.call_timeout,
        );
        let outcome = upserter.run(&partition.namespace, &records).await?;

        if !outcome.failed_ids.is_empty() {
            warn!(
                namespace = %partition.namespace,
                failed = outcome.failed_ids.len(),
                "ingestion finished with partial coverage"
            );
        }

        Ok(IngestReceipt {
            namespace: partition.namespace,
            chunk_count,
            upserted: outcome.upserted,
            failed_ids: outcome.failed_ids,
        })
    }

    /// Fire-and-forget ingestion on the runtime. The caller-visible contract
    /// is "accepted"; completion is a log line, and the task keeps running
    /// even if the triggering request is aborted, so partially embedded work
    /// is never lost.
    pub fn spawn(self: &Arc<Self>, request: IngestRequest) -> tokio::task::JoinHandle<()> {
        let ingestor = Arc::clone(self);
        let job_id = Uuid::new_v4();
        tokio::spawn(async move {
            info!(%job_id, mode = request.mode.as_str(), "background ingestion started");
            match ingestor.ingest(request).await {
                Ok(receipt) => info!(
                    %job_id,
                    namespace = %receipt.namespace,
                    chunks = receipt.chunk_count,
                    upserted = receipt.upserted,
                    failed = receipt.failed_ids.len(),
                    "background ingestion finished"
                ),
                Err(err) => tracing::error!(%job_id, error = %err, "background ingestion failed"),
            }
        })
    }
}
