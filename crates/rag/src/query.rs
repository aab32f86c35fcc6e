//! Query orchestration.
//!
//! Answers a question against one project's namespace: embed the question,
//! retrieve, assemble a grounded prompt, generate once, and return the answer
//! together with citations built from retrieval metadata. Citation offsets
//! are never parsed out of the model's free text; the inline markers only
//! decide which citations get flagged as referenced.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use docanchor_core::{AppError, AppResult, RagConfig};
use docanchor_llm::{LlmClient, LlmRequest};
use docanchor_prompt::{build_grounded_prompt, ContextBlock};

use crate::documents::{DocumentStatus, DocumentStore};
use crate::embeddings::EmbeddingProvider;
use crate::index::{QueryFilter, VectorIndex};
use crate::retry::retry_with_backoff;
use crate::types::{Citation, QueryRequest, QueryResult, ScoredRecord};

/// Orchestrates query answering against the capability gateways.
pub struct QueryOrchestrator {
    documents: Arc<dyn DocumentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn LlmClient>,
    config: RagConfig,
}

impl QueryOrchestrator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn LlmClient>,
        config: RagConfig,
    ) -> Self {
        Self {
            documents,
            embedder,
            index,
            generator,
            config,
        }
    }

    /// Answer a question against the project's indexed documents.
    ///
    /// With zero relevant chunks the result signals "no context" and the
    /// generation capability is never invoked. Generation failures surface as
    /// `AppError::Generation` after the retry budget, never as a silently
    /// degraded answer.
    pub async fn answer(&self, project_id: Uuid, request: &QueryRequest) -> AppResult<QueryResult> {
        let retrieved = self.retrieve(project_id, request).await?;

        if retrieved.is_empty() {
            tracing::info!(project_id = %project_id, "No relevant context found, skipping generation");
            return Ok(QueryResult::no_context(&request.question));
        }

        let context: Vec<ContextBlock> = retrieved
            .iter()
            .map(|r| ContextBlock {
                chunk_id: r.chunk_id.clone(),
                source_file: r.metadata.original_filename.clone(),
                text: r.text.clone(),
            })
            .collect();

        let prompt = build_grounded_prompt(&request.question, &context)?;

        let llm_request = LlmRequest::new(prompt.user, self.config.generation.model.clone())
            .with_system(prompt.system)
            .with_temperature(self.config.generation.temperature)
            .with_max_tokens(self.config.generation.max_tokens);

        let response = retry_with_backoff(&self.config.retry, "generate_answer", || async {
            match tokio::time::timeout(
                self.config.generation.timeout(),
                self.generator.complete(&llm_request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(format!(
                    "generation did not complete within {:?}",
                    self.config.generation.timeout()
                ))),
            }
        })
        .await
        .map_err(|e| match e {
            AppError::Generation(_) => e,
            other => AppError::Generation(other.to_string()),
        })?;

        // Citations come from retrieval metadata captured before generation;
        // the answer text only toggles the cited flag.
        let mut citations: Vec<Citation> = retrieved.iter().map(Citation::from_retrieved).collect();
        for citation in &mut citations {
            citation.cited = response
                .content
                .contains(&format!("[{}]", citation.chunk_id));
        }

        tracing::info!(
            project_id = %project_id,
            retrieved = citations.len(),
            cited = citations.iter().filter(|c| c.cited).count(),
            "Query answered"
        );

        Ok(QueryResult {
            answer: response.content,
            citations,
            no_context: false,
        })
    }

    /// Retrieval without generation: return citations for the chunks most
    /// similar to the given text.
    pub async fn similar(&self, project_id: Uuid, request: &QueryRequest) -> AppResult<Vec<Citation>> {
        let retrieved = self.retrieve(project_id, request).await?;
        Ok(retrieved.iter().map(Citation::from_retrieved).collect())
    }

    async fn retrieve(
        &self,
        project_id: Uuid,
        request: &QueryRequest,
    ) -> AppResult<Vec<ScoredRecord>> {
        if request.top_k == 0 {
            return Err(AppError::InvalidConfiguration(
                "top_k must be greater than zero".to_string(),
            ));
        }

        // Project validation: only completed documents are queryable, and a
        // project without any is an error rather than an empty answer.
        let documents = self.documents.list_by_project(project_id).await?;
        let completed: HashSet<Uuid> = documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Completed)
            .map(|d| d.id)
            .collect();

        if completed.is_empty() {
            return Err(AppError::NotFound(format!(
                "project {} has no completed documents",
                project_id
            )));
        }

        if let Some(requested) = &request.document_ids {
            for id in requested {
                if !completed.contains(id) {
                    return Err(AppError::NotFound(format!(
                        "document {} not found in project or not yet processed",
                        id
                    )));
                }
            }
        }

        let query_vector = retry_with_backoff(&self.config.retry, "embed_query", || async {
            match tokio::time::timeout(
                self.config.embedding.timeout(),
                self.embedder.embed(&request.question),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(format!(
                    "query embedding did not complete within {:?}",
                    self.config.embedding.timeout()
                ))),
            }
        })
        .await?;

        let filter = request
            .document_ids
            .clone()
            .map(QueryFilter::for_documents);

        let namespace = project_id.to_string();
        let hits = retry_with_backoff(&self.config.retry, "query_index", || {
            self.index
                .query(&namespace, &query_vector, request.top_k, filter.as_ref())
        })
        .await?;

        let threshold = request
            .score_threshold
            .or(self.config.retrieval.score_threshold);

        // Drop low-relevance hits, plus anything whose document is not in a
        // completed state. An in-flight ingestion's chunks are simply not
        // present yet from the query's point of view.
        let filtered: Vec<ScoredRecord> = hits
            .into_iter()
            .filter(|hit| threshold.map(|t| hit.score >= t).unwrap_or(true))
            .filter(|hit| completed.contains(&hit.metadata.document_id))
            .collect();

        tracing::debug!(
            project_id = %project_id,
            hits = filtered.len(),
            "Retrieved chunks after filtering"
        );

        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Document, MemoryDocumentStore};
    use crate::embeddings::MockProvider;
    use crate::index::MemoryIndex;
    use crate::types::{ChunkMetadata, VectorRecord};
    use docanchor_core::AppResult as CoreResult;
    use docanchor_llm::{LlmResponse, MockClient};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// LLM client that counts completions, to prove the no-context
    /// short-circuit never generates.
    struct CountingClient {
        inner: MockClient,
        calls: AtomicU32,
    }

    impl CountingClient {
        fn new() -> Self {
            Self {
                inner: MockClient::new(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for CountingClient {
        fn provider_name(&self) -> &str {
            "counting"
        }

        async fn complete(&self, request: &LlmRequest) -> CoreResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.complete(request).await
        }
    }

    /// Client that always fails.
    struct FailingClient;

    #[async_trait::async_trait]
    impl LlmClient for FailingClient {
        fn provider_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: &LlmRequest) -> CoreResult<LlmResponse> {
            Err(AppError::Generation("provider exploded".into()))
        }
    }

    struct Harness {
        documents: Arc<MemoryDocumentStore>,
        index: Arc<MemoryIndex>,
        embedder: Arc<MockProvider>,
        client: Arc<CountingClient>,
        orchestrator: QueryOrchestrator,
    }

    fn quick_config() -> RagConfig {
        let mut config = RagConfig::default();
        config.retry.initial_backoff_ms = 1;
        config.retry.max_backoff_ms = 2;
        config
    }

    fn harness() -> Harness {
        let documents = Arc::new(MemoryDocumentStore::new());
        let index = Arc::new(MemoryIndex::new());
        let embedder = Arc::new(MockProvider::new(64));
        let client = Arc::new(CountingClient::new());

        let orchestrator = QueryOrchestrator::new(
            Arc::clone(&documents) as Arc<dyn DocumentStore>,
            Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
            Arc::clone(&index) as Arc<dyn VectorIndex>,
            Arc::clone(&client) as Arc<dyn LlmClient>,
            quick_config(),
        );

        Harness {
            documents,
            index,
            embedder,
            client,
            orchestrator,
        }
    }

    /// Register a completed document and index its text as a single chunk.
    async fn index_chunk(h: &Harness, project: Uuid, name: &str, text: &str, seq_base: u32) -> Uuid {
        let mut document = Document::new(project, name, PathBuf::from(name));
        let id = document.id;
        document.status = DocumentStatus::Completed;
        document.chunk_count = 1;
        h.documents.insert(document).await.unwrap();

        let embedding = h.embedder.embed(text).await.unwrap();
        h.index
            .upsert(
                &project.to_string(),
                vec![VectorRecord {
                    chunk_id: format!("{}:{}", id, seq_base),
                    embedding,
                    text: text.to_string(),
                    metadata: ChunkMetadata {
                        document_id: id,
                        project_id: project,
                        start_offset: 0,
                        end_offset: text.chars().count(),
                        sequence_index: seq_base,
                        original_filename: name.to_string(),
                    },
                }],
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_answer_with_citations() {
        let h = harness();
        let project = Uuid::new_v4();
        let doc = index_chunk(
            &h,
            project,
            "kb.md",
            "docanchor traces every answer back to character offsets",
            0,
        )
        .await;

        let mut request = QueryRequest::new("how does docanchor trace answers to offsets?", 5);
        request.score_threshold = Some(0.05);
        let result = h.orchestrator.answer(project, &request).await.unwrap();

        assert!(!result.no_context);
        assert_eq!(result.citations.len(), 1);
        let citation = &result.citations[0];
        assert_eq!(citation.document_id, doc);
        assert_eq!(citation.chunk_id, format!("{}:0", doc));
        assert_eq!(citation.source_file, "kb.md");
        assert_eq!(citation.start_offset, 0);
        // The mock client echoes the markers, so the chunk counts as cited
        assert!(citation.cited);
        assert_eq!(h.client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_context_skips_generation() {
        let h = harness();
        let project = Uuid::new_v4();
        index_chunk(&h, project, "kb.md", "quarterly financial figures", 0).await;

        // Impossible threshold guarantees zero hits survive
        let mut request = QueryRequest::new("completely unrelated topic", 5);
        request.score_threshold = Some(2.0);

        let result = h.orchestrator.answer(project, &request).await.unwrap();

        assert!(result.no_context);
        assert!(result.citations.is_empty());
        assert!(result.answer.contains("could not find"));
        assert_eq!(h.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_project_without_completed_documents_is_an_error() {
        let h = harness();
        let project = Uuid::new_v4();

        // A pending document exists, but nothing completed
        let document = Document::new(project, "pending.md", PathBuf::from("pending.md"));
        h.documents.insert(document).await.unwrap();

        let request = QueryRequest::new("anything", 5);
        let result = h.orchestrator.answer(project, &request).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_processing_documents_are_invisible() {
        let h = harness();
        let project = Uuid::new_v4();
        index_chunk(&h, project, "done.md", "visible completed content", 0).await;

        // Second document still processing, but with vectors already upserted
        let mut in_flight = Document::new(project, "inflight.md", PathBuf::from("inflight.md"));
        let in_flight_id = in_flight.id;
        in_flight.status = DocumentStatus::Processing;
        h.documents.insert(in_flight).await.unwrap();

        let text = "visible completed content almost identical";
        let embedding = h.embedder.embed(text).await.unwrap();
        h.index
            .upsert(
                &project.to_string(),
                vec![VectorRecord {
                    chunk_id: format!("{}:0", in_flight_id),
                    embedding,
                    text: text.to_string(),
                    metadata: ChunkMetadata {
                        document_id: in_flight_id,
                        project_id: project,
                        start_offset: 0,
                        end_offset: text.chars().count(),
                        sequence_index: 0,
                        original_filename: "inflight.md".to_string(),
                    },
                }],
            )
            .await
            .unwrap();

        let request = QueryRequest::new("visible completed content", 10);
        let result = h.orchestrator.answer(project, &request).await.unwrap();

        assert!(!result.citations.is_empty());
        assert!(result
            .citations
            .iter()
            .all(|c| c.document_id != in_flight_id));
    }

    #[tokio::test]
    async fn test_document_filter_rejects_unknown_ids() {
        let h = harness();
        let project = Uuid::new_v4();
        index_chunk(&h, project, "kb.md", "some content", 0).await;

        let mut request = QueryRequest::new("some content", 5);
        request.document_ids = Some(vec![Uuid::new_v4()]);

        let result = h.orchestrator.answer(project, &request).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_document_filter_restricts_results() {
        let h = harness();
        let project = Uuid::new_v4();
        let doc_a = index_chunk(&h, project, "a.md", "shared topic text alpha", 0).await;
        let _doc_b = index_chunk(&h, project, "b.md", "shared topic text beta", 0).await;

        let mut request = QueryRequest::new("shared topic text", 10);
        request.document_ids = Some(vec![doc_a]);

        let result = h.orchestrator.answer(project, &request).await.unwrap();
        assert!(!result.citations.is_empty());
        assert!(result.citations.iter().all(|c| c.document_id == doc_a));
    }

    #[tokio::test]
    async fn test_generation_failure_surfaces() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let index = Arc::new(MemoryIndex::new());
        let embedder = Arc::new(MockProvider::new(64));

        let orchestrator = QueryOrchestrator::new(
            Arc::clone(&documents) as Arc<dyn DocumentStore>,
            Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
            Arc::clone(&index) as Arc<dyn VectorIndex>,
            Arc::new(FailingClient),
            quick_config(),
        );

        let h = Harness {
            documents,
            index,
            embedder,
            client: Arc::new(CountingClient::new()),
            orchestrator,
        };
        let project = Uuid::new_v4();
        index_chunk(&h, project, "kb.md", "content the query will match", 0).await;

        let request = QueryRequest::new("content the query will match", 5);
        let result = h.orchestrator.answer(project, &request).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
    }

    #[tokio::test]
    async fn test_zero_top_k_is_invalid() {
        let h = harness();
        let project = Uuid::new_v4();
        index_chunk(&h, project, "kb.md", "content", 0).await;

        let request = QueryRequest::new("content", 0);
        let result = h.orchestrator.answer(project, &request).await;
        assert!(matches!(result, Err(AppError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_similar_returns_citations_without_generation() {
        let h = harness();
        let project = Uuid::new_v4();
        index_chunk(&h, project, "kb.md", "retrieval only content", 0).await;

        let request = QueryRequest::new("retrieval only content", 5);
        let citations = h.orchestrator.similar(project, &request).await.unwrap();

        assert_eq!(citations.len(), 1);
        assert!(!citations[0].cited);
        assert_eq!(h.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_citations_ordered_by_score() {
        let h = harness();
        let project = Uuid::new_v4();
        index_chunk(&h, project, "close.md", "rust async runtime internals", 0).await;
        index_chunk(&h, project, "far.md", "gardening tips for spring", 0).await;

        let mut request = QueryRequest::new("rust async runtime", 10);
        request.score_threshold = Some(-1.0);

        let result = h.orchestrator.answer(project, &request).await.unwrap();
        assert_eq!(result.citations.len(), 2);
        assert!(result.citations[0].score >= result.citations[1].score);
        assert_eq!(result.citations[0].source_file, "close.md");
    }
}
