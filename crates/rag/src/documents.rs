//! Document records, lifecycle state machine, and collaborator seams.
//!
//! Persistence of document records is an external concern; the pipeline only
//! talks to the [`DocumentStore`] trait. [`MemoryDocumentStore`] is the
//! in-process adapter used by the CLI and the tests. Raw-text extraction is
//! likewise behind [`DocumentLoader`]; format-specific extraction (PDF, DOCX)
//! plugs in there without touching the orchestrators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docanchor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

/// Document processing status.
///
/// A closed state machine rather than boolean flags, so an illegal transition
/// is an error at the single place transitions happen instead of a silent
/// field write somewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Whether moving from `self` to `next` is a legal lifecycle transition.
    ///
    /// `Completed -> Processing` and `Failed -> Processing` are legal because
    /// reprocessing re-runs the pipeline; everything else outside the normal
    /// pending -> processing -> completed/failed flow is rejected.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Processing)
                | (Failed, Processing)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

/// The pipeline stage where an ingestion failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Load,
    Chunk,
    Embed,
    Store,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Load => "load",
            IngestStage::Chunk => "chunk",
            IngestStage::Embed => "embed",
            IngestStage::Store => "store",
        }
    }
}

/// Failure detail recorded on a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    pub stage: IngestStage,
    pub message: String,
}

/// A document registered for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,

    /// Filename as uploaded, carried into citation metadata
    pub original_filename: String,

    /// Where the stored file lives
    pub file_path: PathBuf,

    pub status: DocumentStatus,

    /// Number of chunks produced by the last successful ingestion
    pub chunk_count: u32,

    /// Character count of the extracted text
    pub character_count: Option<u64>,

    /// Failure detail when status is `Failed`
    pub failure: Option<IngestFailure>,

    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Register a new document in `Pending` state.
    pub fn new(project_id: Uuid, original_filename: impl Into<String>, file_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            original_filename: original_filename.into(),
            file_path,
            status: DocumentStatus::Pending,
            chunk_count: 0,
            character_count: None,
            failure: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }
}

/// Storage seam for document records.
///
/// The orchestrators are the only writers; status changes go through the
/// `mark_*` methods, which validate the lifecycle state machine.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Register a document.
    async fn insert(&self, document: Document) -> AppResult<()>;

    /// Fetch a document by id.
    async fn get(&self, id: Uuid) -> AppResult<Document>;

    /// List all documents belonging to a project.
    async fn list_by_project(&self, project_id: Uuid) -> AppResult<Vec<Document>>;

    /// Transition to `Processing`, clearing stale failure detail.
    async fn mark_processing(&self, id: Uuid) -> AppResult<()>;

    /// Transition to `Completed`, recording ingestion metrics.
    async fn mark_completed(&self, id: Uuid, chunk_count: u32, character_count: u64)
        -> AppResult<()>;

    /// Transition to `Failed`, recording the originating stage and message.
    async fn mark_failed(&self, id: Uuid, failure: IngestFailure) -> AppResult<()>;

    /// Remove the document record. Callers delete the document's vectors
    /// first so no citation can dangle.
    async fn remove(&self, id: Uuid) -> AppResult<()>;
}

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn transition(
        &self,
        id: Uuid,
        next: DocumentStatus,
        update: impl FnOnce(&mut Document),
    ) -> AppResult<()> {
        let mut documents = self.documents.write().unwrap();
        let document = documents
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("document {}", id)))?;

        if !document.status.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "document {} cannot move from {} to {}",
                id,
                document.status.as_str(),
                next.as_str()
            )));
        }

        document.status = next;
        update(document);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, document: Document) -> AppResult<()> {
        let mut documents = self.documents.write().unwrap();
        documents.insert(document.id, document);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Document> {
        let documents = self.documents.read().unwrap();
        documents
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("document {}", id)))
    }

    async fn list_by_project(&self, project_id: Uuid) -> AppResult<Vec<Document>> {
        let documents = self.documents.read().unwrap();
        let mut result: Vec<Document> = documents
            .values()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect();
        result.sort_by_key(|d| d.created_at);
        Ok(result)
    }

    async fn mark_processing(&self, id: Uuid) -> AppResult<()> {
        self.transition(id, DocumentStatus::Processing, |d| {
            d.failure = None;
            d.processed_at = None;
        })
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        chunk_count: u32,
        character_count: u64,
    ) -> AppResult<()> {
        self.transition(id, DocumentStatus::Completed, |d| {
            d.chunk_count = chunk_count;
            d.character_count = Some(character_count);
            d.processed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, id: Uuid, failure: IngestFailure) -> AppResult<()> {
        self.transition(id, DocumentStatus::Failed, |d| {
            d.failure = Some(failure);
            d.processed_at = Some(Utc::now());
        })
    }

    async fn remove(&self, id: Uuid) -> AppResult<()> {
        let mut documents = self.documents.write().unwrap();
        documents
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("document {}", id)))
    }
}

/// Raw-text extraction seam.
///
/// Format-specific extraction is a black box from the pipeline's point of
/// view: whatever implementation sits here produces the normalized text that
/// all chunk offsets refer to.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path) -> AppResult<String>;
}

/// Loader for plain-text files (txt, md, and anything else UTF-8).
///
/// Normalizes line endings to `\n`; offsets everywhere refer to the
/// normalized text.
#[derive(Debug, Default)]
pub struct FsLoader;

impl FsLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentLoader for FsLoader {
    async fn load(&self, path: &Path) -> AppResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::DocumentLoad(format!("failed to read {:?}: {}", path, e)))?;

        let text = String::from_utf8(bytes).map_err(|_| {
            AppError::DocumentLoad(format!("{:?} is not valid UTF-8 text", path))
        })?;

        let text = text.strip_prefix('\u{feff}').unwrap_or(&text).to_string();
        Ok(text.replace("\r\n", "\n"))
    }
}
