//! Vector index gateway.
//!
//! Namespace-scoped storage and similarity search for vector records. The
//! namespace is always exactly the project identifier and is the sole
//! isolation boundary between projects' content, so it is enforced here at
//! the gateway, not scattered across callers: every operation takes the
//! namespace explicitly and adapters must never let records cross it.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use docanchor_core::AppResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ChunkMetadata, ScoredRecord, VectorRecord};

/// Optional retrieval filter, applied inside the namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Restrict hits to these documents
    pub document_ids: Option<Vec<Uuid>>,
}

impl QueryFilter {
    pub fn for_documents(document_ids: Vec<Uuid>) -> Self {
        Self {
            document_ids: Some(document_ids),
        }
    }

    /// Whether a record's metadata passes the filter.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match &self.document_ids {
            Some(ids) => ids.contains(&metadata.document_id),
            None => true,
        }
    }
}

/// Trait for vector index backends.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records, keyed by chunk id within the namespace.
    /// Re-upserting the same chunk id replaces the previous record.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> AppResult<()>;

    /// Top-k most similar records within the namespace, descending score.
    async fn query(
        &self,
        namespace: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> AppResult<Vec<ScoredRecord>>;

    /// Delete records by chunk id. Missing ids are not an error.
    async fn delete(&self, namespace: &str, chunk_ids: &[String]) -> AppResult<()>;

    /// Delete every record belonging to a document.
    async fn delete_document(&self, namespace: &str, document_id: Uuid) -> AppResult<()>;

    /// Delete the entire namespace.
    async fn delete_namespace(&self, namespace: &str) -> AppResult<()>;
}

/// Cosine similarity between two vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Score all candidate records and keep the top-k, descending.
pub(crate) fn rank_records(
    records: impl Iterator<Item = VectorRecord>,
    query_vector: &[f32],
    top_k: usize,
    filter: Option<&QueryFilter>,
) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .filter(|r| filter.map(|f| f.matches(&r.metadata)).unwrap_or(true))
        .map(|r| ScoredRecord {
            score: cosine_similarity(query_vector, &r.embedding),
            chunk_id: r.chunk_id,
            text: r.text,
            metadata: r.metadata,
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!((cosine_similarity(&a, &[0.0, 1.0, 0.0])).abs() < 0.001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_filter_matches() {
        let doc = Uuid::new_v4();
        let metadata = ChunkMetadata {
            document_id: doc,
            project_id: Uuid::new_v4(),
            start_offset: 0,
            end_offset: 10,
            sequence_index: 0,
            original_filename: "a.md".to_string(),
        };

        assert!(QueryFilter::default().matches(&metadata));
        assert!(QueryFilter::for_documents(vec![doc]).matches(&metadata));
        assert!(!QueryFilter::for_documents(vec![Uuid::new_v4()]).matches(&metadata));
    }
}
