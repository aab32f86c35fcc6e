//! In-process pipeline wiring for CLI runs.
//!
//! A CLI invocation is a single-process session: documents are ingested into
//! an in-memory index under a fresh project namespace and queried in the same
//! run. Durable multi-tenant storage sits behind the same traits and is a
//! deployment concern, not a CLI one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use walkdir::WalkDir;

use docanchor_core::{AppConfig, AppResult};
use docanchor_llm::create_client;
use docanchor_rag::{
    embeddings::create_provider,
    index::{MemoryIndex, VectorIndex},
    Document, DocumentStore, FsLoader, IngestOptions, IngestionOrchestrator, MemoryDocumentStore,
    QueryOrchestrator,
};

pub(crate) struct Session {
    pub project_id: Uuid,
    documents: Arc<MemoryDocumentStore>,
    ingestion: IngestionOrchestrator,
    pub query: QueryOrchestrator,
}

/// Ingestion totals for a session.
pub(crate) struct IngestSummary {
    pub documents: usize,
    pub chunks: u32,
    pub failures: usize,
}

impl Session {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let documents = Arc::new(MemoryDocumentStore::new());
        let index = Arc::new(MemoryIndex::new());
        let embedder = create_provider(&config.rag.embedding)?;
        let generator = create_client(&config.rag.generation)?;

        let ingestion = IngestionOrchestrator::new(
            Arc::clone(&documents) as Arc<dyn DocumentStore>,
            Arc::new(FsLoader::new()),
            Arc::clone(&embedder),
            Arc::clone(&index) as Arc<dyn VectorIndex>,
            config.rag.clone(),
        );

        let query = QueryOrchestrator::new(
            Arc::clone(&documents) as Arc<dyn DocumentStore>,
            embedder,
            index as Arc<dyn VectorIndex>,
            generator,
            config.rag.clone(),
        );

        Ok(Self {
            project_id: Uuid::new_v4(),
            documents,
            ingestion,
            query,
        })
    }

    /// Ingest the given files and directories into the session's project.
    ///
    /// Per-file failures are logged and skipped so one unreadable file does
    /// not sink the whole run.
    pub async fn ingest_paths(
        &self,
        paths: &[PathBuf],
        options: &IngestOptions,
    ) -> AppResult<IngestSummary> {
        let cancel = CancellationToken::new();
        let mut summary = IngestSummary {
            documents: 0,
            chunks: 0,
            failures: 0,
        };

        for path in paths {
            if path.is_dir() {
                for entry in WalkDir::new(path)
                    .follow_links(false)
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    if entry.file_type().is_file() {
                        self.ingest_one(entry.path(), options, &cancel, &mut summary)
                            .await;
                    }
                }
            } else {
                self.ingest_one(path, options, &cancel, &mut summary).await;
            }
        }

        Ok(summary)
    }

    async fn ingest_one(
        &self,
        path: &Path,
        options: &IngestOptions,
        cancel: &CancellationToken,
        summary: &mut IngestSummary,
    ) {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let document = Document::new(self.project_id, filename.clone(), path.to_path_buf());
        let id = document.id;
        if let Err(e) = self.documents.insert(document).await {
            tracing::warn!(file = %filename, error = %e, "Skipping file");
            summary.failures += 1;
            return;
        }

        match self.ingestion.ingest(id, options, cancel).await {
            Ok(chunks) => {
                summary.documents += 1;
                summary.chunks += chunks;
            }
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "Skipping file");
                summary.failures += 1;
            }
        }
    }
}
