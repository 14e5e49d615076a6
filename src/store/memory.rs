//! In-memory vector store
//!
//! Exact cosine-similarity scan over per-namespace record maps. Used for
//! development and tests; data lives only as long as the process. Each
//! namespace pins the dimensionality of its first write and rejects any
//! record or query vector that disagrees.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MetadataFilter, ScoredMatch, StoreError, VectorRecord, VectorStore};

#[derive(Default)]
struct Namespace {
    dimension: usize,
    records: HashMap<String, VectorRecord>,
}

/// Process-local [`VectorStore`] implementation.
#[derive(Default)]
pub struct MemoryVectorStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in a namespace. Test and
    /// diagnostics helper; not part of the store contract.
    pub async fn namespace_len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(|ns| ns.records.len())
            .unwrap_or(0)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces.entry(namespace.to_string()).or_default();
        if ns.records.is_empty() {
            ns.dimension = records[0].values.len();
        }
        for record in records {
            if record.values.len() != ns.dimension {
                return Err(StoreError::DimensionMismatch {
                    namespace: namespace.to_string(),
                    expected: ns.dimension,
                    actual: record.values.len(),
                });
            }
            ns.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredMatch>, StoreError> {
        let namespaces = self.namespaces.read().await;
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        if !ns.records.is_empty() && vector.len() != ns.dimension {
            return Err(StoreError::DimensionMismatch {
                namespace: namespace.to_string(),
                expected: ns.dimension,
                actual: vector.len(),
            });
        }

        let mut matches: Vec<ScoredMatch> = ns
            .records
            .values()
            .filter(|record| filter.map_or(true, |f| f.matches(&record.metadata)))
            .map(|record| ScoredMatch {
                id: record.id.clone(),
                // Backends report scores in [0, 1]; clamp rather than rescale.
                score: cosine_similarity(vector, &record.values).clamp(0.0, 1.0),
                metadata: record.metadata.clone(),
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
        let namespaces = self.namespaces.read().await;
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| ns.records.get(id).cloned())
            .collect())
    }

    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &MetadataFilter,
    ) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().await;
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.records.retain(|_, record| !filter.matches(&record.metadata));
        }
        Ok(())
    }
}
