//! Ingestion orchestration.
//!
//! Drives a document through load, chunk, embed, and store. Stages within one
//! document are strictly sequential, but embed/store batches are pipelined
//! with bounded concurrency; batch completion order does not matter as long
//! as every batch lands before the document is marked completed.
//!
//! The orchestrator owns the document lifecycle: it is the only writer of
//! status transitions, it records the originating stage of every failure, and
//! it rolls back the attempt's vectors on cancellation or failure so the
//! index never keeps a partial chunk set.

use futures::stream::{self, TryStreamExt};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use docanchor_core::{AppError, AppResult, ChunkingConfig, RagConfig};

use crate::chunker;
use crate::documents::{Document, DocumentLoader, DocumentStatus, DocumentStore, IngestFailure, IngestStage};
use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::retry::retry_with_backoff;
use crate::types::{Chunk, ChunkMetadata, VectorRecord};

/// Per-run chunking options, usually a project's configured geometry.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl IngestOptions {
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
        }
    }
}

/// An error tagged with the pipeline stage it came from.
struct StageError {
    stage: IngestStage,
    error: AppError,
}

impl StageError {
    fn new(stage: IngestStage, error: AppError) -> Self {
        Self { stage, error }
    }
}

/// Orchestrates document ingestion against the capability gateways.
pub struct IngestionOrchestrator {
    documents: Arc<dyn DocumentStore>,
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: RagConfig,
}

impl IngestionOrchestrator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: RagConfig,
    ) -> Self {
        Self {
            documents,
            loader,
            embedder,
            index,
            config,
        }
    }

    /// Ingest a registered document.
    ///
    /// Moves the document to `Processing`, runs the pipeline, and finishes in
    /// `Completed` or `Failed`. The failure detail (stage and message) is
    /// recorded on the document for status polling; the error is also
    /// returned so in-process callers can log it.
    ///
    /// Returns the number of chunks stored.
    pub async fn ingest(
        &self,
        document_id: Uuid,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> AppResult<u32> {
        let document = self.documents.get(document_id).await?;

        if document.status == DocumentStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "document {} is already completed; use reprocess to re-ingest",
                document_id
            )));
        }

        self.run(document, options, cancel).await
    }

    /// Re-ingest a document, typically with a new chunking geometry.
    ///
    /// Existing vectors for the document are deleted from the namespace first
    /// so the index never holds a mix of old and new chunk sets.
    pub async fn reprocess(
        &self,
        document_id: Uuid,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> AppResult<u32> {
        let document = self.documents.get(document_id).await?;
        let namespace = document.project_id.to_string();

        tracing::info!(document_id = %document_id, "Reprocessing document, deleting existing vectors");

        retry_with_backoff(&self.config.retry, "delete_document_vectors", || {
            self.index.delete_document(&namespace, document_id)
        })
        .await?;

        self.run(document, options, cancel).await
    }

    /// Delete a document and its vectors.
    ///
    /// Vectors are removed from the index synchronously before the document
    /// record goes away, so no citation can reference content that still
    /// appears retrievable.
    pub async fn delete_document(&self, document_id: Uuid) -> AppResult<()> {
        let document = self.documents.get(document_id).await?;
        let namespace = document.project_id.to_string();

        retry_with_backoff(&self.config.retry, "delete_document_vectors", || {
            self.index.delete_document(&namespace, document_id)
        })
        .await?;

        self.documents.remove(document_id).await?;

        tracing::info!(document_id = %document_id, "Deleted document and its vectors");
        Ok(())
    }

    async fn run(
        &self,
        document: Document,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> AppResult<u32> {
        let document_id = document.id;
        self.documents.mark_processing(document_id).await?;

        // Chunk ids upserted by this attempt, shared across batch tasks so a
        // failed or cancelled run can be rolled back.
        let upserted: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        match self
            .execute(&document, options, cancel, Arc::clone(&upserted))
            .await
        {
            Ok((chunk_count, character_count)) => {
                self.documents
                    .mark_completed(document_id, chunk_count, character_count)
                    .await?;
                tracing::info!(
                    document_id = %document_id,
                    chunks = chunk_count,
                    characters = character_count,
                    "Document ingested"
                );
                Ok(chunk_count)
            }
            Err(StageError { stage, error }) => {
                self.rollback(&document, &upserted).await;

                tracing::error!(
                    document_id = %document_id,
                    stage = stage.as_str(),
                    error = %error,
                    "Ingestion failed"
                );

                if let Err(mark_err) = self
                    .documents
                    .mark_failed(
                        document_id,
                        IngestFailure {
                            stage,
                            message: error.to_string(),
                        },
                    )
                    .await
                {
                    tracing::error!(document_id = %document_id, error = %mark_err, "Failed to record ingestion failure");
                }

                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        document: &Document,
        options: &IngestOptions,
        cancel: &CancellationToken,
        upserted: Arc<Mutex<Vec<String>>>,
    ) -> Result<(u32, u64), StageError> {
        if cancel.is_cancelled() {
            return Err(StageError::new(
                IngestStage::Load,
                AppError::Cancelled("ingestion stopped before load".to_string()),
            ));
        }

        // Load
        let text = self
            .loader
            .load(&document.file_path)
            .await
            .map_err(|e| StageError::new(IngestStage::Load, e))?;

        if text.trim().is_empty() {
            // Fatal, not retried
            return Err(StageError::new(
                IngestStage::Load,
                AppError::DocumentLoad("no text extracted from document".to_string()),
            ));
        }
        let character_count = text.chars().count() as u64;

        // Chunk
        let chunks = chunker::chunk(document.id, &text, options.chunk_size, options.overlap)
            .map_err(|e| StageError::new(IngestStage::Chunk, e))?;
        let chunk_count = chunks.len() as u32;

        tracing::debug!(
            document_id = %document.id,
            chunks = chunk_count,
            "Embedding and storing chunk batches"
        );

        // Embed + Store, pipelined across batches
        let namespace = document.project_id.to_string();
        let batch_size = self.config.embedding.batch_size.max(1);
        let batches: Vec<Vec<Chunk>> = chunks
            .chunks(batch_size)
            .map(|batch| batch.to_vec())
            .collect();

        stream::iter(batches.into_iter().map(Ok::<_, StageError>))
            .try_for_each_concurrent(
                self.config.pipeline.max_concurrent_batches.max(1),
                |batch| {
                    let namespace = namespace.clone();
                    let upserted = Arc::clone(&upserted);
                    async move {
                        self.process_batch(&namespace, document, batch, cancel, upserted)
                            .await
                    }
                },
            )
            .await?;

        Ok((chunk_count, character_count))
    }

    async fn process_batch(
        &self,
        namespace: &str,
        document: &Document,
        batch: Vec<Chunk>,
        cancel: &CancellationToken,
        upserted: Arc<Mutex<Vec<String>>>,
    ) -> Result<(), StageError> {
        if cancel.is_cancelled() {
            return Err(StageError::new(
                IngestStage::Embed,
                AppError::Cancelled("ingestion stopped".to_string()),
            ));
        }

        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        let embeddings = retry_with_backoff(&self.config.retry, "embed_batch", || {
            bounded(
                self.config.embedding.timeout(),
                "embedding batch",
                self.embedder.embed_batch(&texts),
            )
        })
        .await
        .map_err(|e| StageError::new(IngestStage::Embed, e))?;

        if embeddings.len() != batch.len() {
            return Err(StageError::new(
                IngestStage::Embed,
                AppError::EmbeddingProvider(format!(
                    "provider returned {} embeddings for {} texts",
                    embeddings.len(),
                    batch.len()
                )),
            ));
        }

        let records: Vec<VectorRecord> = batch
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                chunk_id: chunk.id.clone(),
                embedding,
                text: chunk.text.clone(),
                metadata: ChunkMetadata {
                    document_id: chunk.document_id,
                    project_id: document.project_id,
                    start_offset: chunk.start_offset,
                    end_offset: chunk.end_offset,
                    sequence_index: chunk.seq,
                    original_filename: document.original_filename.clone(),
                },
            })
            .collect();

        if cancel.is_cancelled() {
            return Err(StageError::new(
                IngestStage::Store,
                AppError::Cancelled("ingestion stopped".to_string()),
            ));
        }

        retry_with_backoff(&self.config.retry, "upsert_batch", || {
            self.index.upsert(namespace, records.clone())
        })
        .await
        .map_err(|e| StageError::new(IngestStage::Store, e))?;

        let mut ids = upserted.lock().unwrap();
        ids.extend(batch.iter().map(|c| c.id.clone()));
        Ok(())
    }

    /// Delete whatever this attempt already upserted. Best effort: a rollback
    /// failure is logged, the original error still wins.
    async fn rollback(&self, document: &Document, upserted: &Arc<Mutex<Vec<String>>>) {
        let ids: Vec<String> = {
            let guard = upserted.lock().unwrap();
            guard.clone()
        };
        if ids.is_empty() {
            return;
        }

        let namespace = document.project_id.to_string();
        tracing::warn!(
            document_id = %document.id,
            vectors = ids.len(),
            "Rolling back partially stored vectors"
        );

        if let Err(e) = self.index.delete(&namespace, &ids).await {
            tracing::error!(document_id = %document.id, error = %e, "Rollback failed");
        }
    }
}

/// Bound an external call so a wedged provider yields a typed error.
async fn bounded<T>(
    timeout: std::time::Duration,
    what: &str,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{} did not complete within {:?}",
            what, timeout
        ))),
    }
}
