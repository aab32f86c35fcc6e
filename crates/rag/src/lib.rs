//! Retrieval pipeline for docanchor.
//!
//! This crate contains the offset-preserving chunking engine and the two
//! orchestrators built around it:
//!
//! - [`chunker`] splits document text into overlapping windows whose offsets
//!   are taken directly from the slicing arithmetic, so a citation can always
//!   be traced back to exact character positions in the original text.
//! - [`ingest`] drives a document through load, chunk, embed, and store,
//!   updating its lifecycle state and cleaning up after failures.
//! - [`query`] answers a question against one project's namespace and returns
//!   the answer together with offset-accurate citations.
//!
//! The embedding model and the vector index are capability interfaces
//! ([`embeddings::EmbeddingProvider`], [`index::VectorIndex`]) with swappable
//! adapters; orchestrator logic never depends on a concrete provider.

pub mod chunker;
pub mod documents;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod query;
pub mod types;

mod retry;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use documents::{
    Document, DocumentLoader, DocumentStatus, DocumentStore, FsLoader, IngestFailure, IngestStage,
    MemoryDocumentStore,
};
pub use ingest::{IngestOptions, IngestionOrchestrator};
pub use query::QueryOrchestrator;
pub use types::{Chunk, ChunkMetadata, Citation, QueryRequest, QueryResult, ScoredRecord, VectorRecord};
