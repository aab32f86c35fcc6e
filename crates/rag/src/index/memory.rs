//! In-memory vector index.
//!
//! Brute-force cosine similarity over per-namespace maps behind an RwLock.
//! The query path only ever reads the map belonging to the requested
//! namespace, so records cannot leak across projects by construction.

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use docanchor_core::AppResult;

use crate::index::{rank_records, QueryFilter, VectorIndex};
use crate::types::{ScoredRecord, VectorRecord};

/// In-memory index adapter, used by tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored under a namespace.
    pub fn namespace_len(&self, namespace: &str) -> usize {
        let namespaces = self.namespaces.read().unwrap();
        namespaces.get(namespace).map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> AppResult<()> {
        let mut namespaces = self.namespaces.write().unwrap();
        let space = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            space.insert(record.chunk_id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> AppResult<Vec<ScoredRecord>> {
        let namespaces = self.namespaces.read().unwrap();
        let Some(space) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        Ok(rank_records(
            space.values().cloned(),
            query_vector,
            top_k,
            filter,
        ))
    }

    async fn delete(&self, namespace: &str, chunk_ids: &[String]) -> AppResult<()> {
        let mut namespaces = self.namespaces.write().unwrap();
        if let Some(space) = namespaces.get_mut(namespace) {
            for id in chunk_ids {
                space.remove(id);
            }
        }
        Ok(())
    }

    async fn delete_document(&self, namespace: &str, document_id: Uuid) -> AppResult<()> {
        let mut namespaces = self.namespaces.write().unwrap();
        if let Some(space) = namespaces.get_mut(namespace) {
            space.retain(|_, record| record.metadata.document_id != document_id);
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> AppResult<()> {
        let mut namespaces = self.namespaces.write().unwrap();
        namespaces.remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn record(namespace_doc: Uuid, project: Uuid, seq: u32, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            chunk_id: format!("{}:{}", namespace_doc, seq),
            embedding,
            text: format!("chunk {}", seq),
            metadata: ChunkMetadata {
                document_id: namespace_doc,
                project_id: project,
                start_offset: (seq as usize) * 80,
                end_offset: (seq as usize) * 80 + 100,
                sequence_index: seq,
                original_filename: "doc.md".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let index = MemoryIndex::new();
        let doc = Uuid::new_v4();
        let project = Uuid::new_v4();
        let ns = project.to_string();

        index
            .upsert(
                &ns,
                vec![
                    record(doc, project, 0, vec![1.0, 0.0, 0.0]),
                    record(doc, project, 1, vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = index.query(&ns, &[1.0, 0.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, format!("{}:0", doc));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_chunk_id() {
        let index = MemoryIndex::new();
        let doc = Uuid::new_v4();
        let project = Uuid::new_v4();
        let ns = project.to_string();

        index
            .upsert(&ns, vec![record(doc, project, 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        let mut replacement = record(doc, project, 0, vec![0.0, 1.0]);
        replacement.text = "replaced".to_string();
        index.upsert(&ns, vec![replacement]).await.unwrap();

        assert_eq!(index.namespace_len(&ns), 1);
        let hits = index.query(&ns, &[0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].text, "replaced");
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let index = MemoryIndex::new();
        let project_a = Uuid::new_v4();
        let project_b = Uuid::new_v4();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        // Near-duplicate content in both namespaces
        let mut a = record(doc_a, project_a, 0, vec![1.0, 0.0, 0.0]);
        a.text = "the shared secret paragraph".to_string();
        let mut b = record(doc_b, project_b, 0, vec![1.0, 0.01, 0.0]);
        b.text = "the shared secret paragraph".to_string();

        index.upsert(&project_a.to_string(), vec![a]).await.unwrap();
        index.upsert(&project_b.to_string(), vec![b]).await.unwrap();

        let hits = index
            .query(&project_a.to_string(), &[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.project_id, project_a);
        assert_eq!(hits[0].metadata.document_id, doc_a);
    }

    #[tokio::test]
    async fn test_query_unknown_namespace_is_empty() {
        let index = MemoryIndex::new();
        let hits = index.query("missing", &[1.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_ids() {
        let index = MemoryIndex::new();
        let doc = Uuid::new_v4();
        let project = Uuid::new_v4();
        let ns = project.to_string();

        index
            .upsert(
                &ns,
                vec![
                    record(doc, project, 0, vec![1.0, 0.0]),
                    record(doc, project, 1, vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        index
            .delete(&ns, &[format!("{}:0", doc), "missing-id".to_string()])
            .await
            .unwrap();

        assert_eq!(index.namespace_len(&ns), 1);
    }

    #[tokio::test]
    async fn test_delete_document_removes_all_its_records() {
        let index = MemoryIndex::new();
        let project = Uuid::new_v4();
        let ns = project.to_string();
        let doc_kept = Uuid::new_v4();
        let doc_gone = Uuid::new_v4();

        index
            .upsert(
                &ns,
                vec![
                    record(doc_kept, project, 0, vec![1.0, 0.0]),
                    record(doc_gone, project, 0, vec![0.9, 0.1]),
                    record(doc_gone, project, 1, vec![0.8, 0.2]),
                ],
            )
            .await
            .unwrap();

        index.delete_document(&ns, doc_gone).await.unwrap();

        let hits = index.query(&ns, &[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.document_id, doc_kept);
    }

    #[tokio::test]
    async fn test_document_filter() {
        let index = MemoryIndex::new();
        let project = Uuid::new_v4();
        let ns = project.to_string();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        index
            .upsert(
                &ns,
                vec![
                    record(doc_a, project, 0, vec![1.0, 0.0]),
                    record(doc_b, project, 0, vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let filter = QueryFilter::for_documents(vec![doc_b]);
        let hits = index
            .query(&ns, &[1.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.document_id, doc_b);
    }
}
