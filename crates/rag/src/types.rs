//! Pipeline type definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A contiguous, offset-tagged slice of a document's text.
///
/// Offsets are character positions in the original document text,
/// inclusive-exclusive. They come straight out of the chunking arithmetic and
/// are never re-derived afterwards; everything downstream (vector metadata,
/// citations) copies them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier, derived from the document id and sequence index
    pub id: String,

    /// Owning document
    pub document_id: Uuid,

    /// The chunk text
    pub text: String,

    /// First character of the chunk in the original text
    pub start_offset: usize,

    /// One past the last character of the chunk in the original text
    pub end_offset: usize,

    /// Position of this chunk in the document (0-indexed)
    pub seq: u32,
}

impl Chunk {
    /// Derive the stable chunk identifier for a document and sequence index.
    ///
    /// Reprocessing a document with the same geometry reproduces the same ids,
    /// which is what makes upserts idempotent.
    pub fn derive_id(document_id: &Uuid, seq: u32) -> String {
        format!("{}:{}", document_id, seq)
    }

    /// Character length of the chunk.
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// Metadata stored with every vector record.
///
/// This schema is a stable contract: consumers reconstruct citations from
/// exactly these fields, and reprocessing must keep producing them unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: Uuid,
    pub project_id: Uuid,
    pub start_offset: usize,
    pub end_offset: usize,
    pub sequence_index: u32,
    pub original_filename: String,
}

/// A record stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Chunk identifier, the external key for upserts and deletes
    pub chunk_id: String,

    /// Embedding vector
    pub embedding: Vec<f32>,

    /// The literal chunk text
    pub text: String,

    /// Citation metadata
    pub metadata: ChunkMetadata,
}

/// A retrieval hit returned by the vector index, ordered by descending score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub chunk_id: String,
    pub score: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A pointer proving where an answer's supporting text came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Chunk identifier
    pub chunk_id: String,

    /// Owning document
    pub document_id: Uuid,

    /// Character range in the original document text
    pub start_offset: usize,
    pub end_offset: usize,

    /// Similarity score from retrieval
    pub score: f32,

    /// The literal chunk text
    pub text: String,

    /// Original filename of the source document
    pub source_file: String,

    /// Whether the answer referenced this chunk inline
    pub cited: bool,
}

impl Citation {
    /// Build a citation from a retrieval hit.
    ///
    /// All fields come from metadata captured at ingestion time, before any
    /// generation happens, so citation correctness does not depend on the
    /// model's output.
    pub fn from_retrieved(record: &ScoredRecord) -> Self {
        Self {
            chunk_id: record.chunk_id.clone(),
            document_id: record.metadata.document_id,
            start_offset: record.metadata.start_offset,
            end_offset: record.metadata.end_offset,
            score: record.score,
            text: record.text.clone(),
            source_file: record.metadata.original_filename.clone(),
            cited: false,
        }
    }

    /// Truncate the citation text for display, breaking on a word boundary.
    pub fn snippet(&self, max_len: usize) -> String {
        if self.text.len() <= max_len {
            return self.text.clone();
        }

        let mut cut = max_len;
        while cut > 0 && !self.text.is_char_boundary(cut) {
            cut -= 1;
        }
        let truncated = &self.text[..cut];
        match truncated.rfind(char::is_whitespace) {
            Some(last_space) if last_space > 0 => format!("{}...", &truncated[..last_space]),
            _ => format!("{}...", truncated),
        }
    }
}

/// A question against one project's namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,

    /// Number of chunks to retrieve
    pub top_k: usize,

    /// Minimum similarity score; results below it are dropped.
    /// `None` falls back to the configured default.
    pub score_threshold: Option<f32>,

    /// Optional filter to specific documents
    pub document_ids: Option<Vec<Uuid>>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>, top_k: usize) -> Self {
        Self {
            question: question.into(),
            top_k,
            score_threshold: None,
            document_ids: None,
        }
    }
}

/// The outcome of one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Generated answer with inline `[chunk_id]` markers
    pub answer: String,

    /// One citation per retrieved chunk, ordered by descending score.
    /// Every retrieved chunk appears here, not only those cited inline.
    pub citations: Vec<Citation>,

    /// True when no relevant context was found and generation was skipped
    pub no_context: bool,
}

impl QueryResult {
    /// The result returned when nothing relevant was retrieved.
    ///
    /// Generation is never invoked in that case; the model must not get the
    /// chance to fabricate an answer with no supporting context.
    pub fn no_context(question: &str) -> Self {
        Self {
            answer: format!(
                "I could not find information about \"{}\" in the available documents.",
                question
            ),
            citations: Vec::new(),
            no_context: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_id_stable() {
        let doc = Uuid::new_v4();
        assert_eq!(Chunk::derive_id(&doc, 3), format!("{}:3", doc));
        assert_eq!(Chunk::derive_id(&doc, 3), Chunk::derive_id(&doc, 3));
    }

    #[test]
    fn test_citation_from_retrieved_copies_offsets() {
        let doc = Uuid::new_v4();
        let project = Uuid::new_v4();
        let record = ScoredRecord {
            chunk_id: Chunk::derive_id(&doc, 2),
            score: 0.83,
            text: "the cited text".to_string(),
            metadata: ChunkMetadata {
                document_id: doc,
                project_id: project,
                start_offset: 1800,
                end_offset: 2800,
                sequence_index: 2,
                original_filename: "report.pdf".to_string(),
            },
        };

        let citation = Citation::from_retrieved(&record);
        assert_eq!(citation.start_offset, 1800);
        assert_eq!(citation.end_offset, 2800);
        assert_eq!(citation.document_id, doc);
        assert_eq!(citation.source_file, "report.pdf");
        assert!(!citation.cited);
    }

    #[test]
    fn test_snippet_truncation() {
        let mut citation = Citation {
            chunk_id: "d:0".to_string(),
            document_id: Uuid::new_v4(),
            start_offset: 0,
            end_offset: 10,
            score: 1.0,
            text: "Short text".to_string(),
            source_file: "a.md".to_string(),
            cited: false,
        };
        assert_eq!(citation.snippet(100), "Short text");

        citation.text = "This is a very long text that needs to be truncated somewhere".to_string();
        let snippet = citation.snippet(30);
        assert!(snippet.len() <= 33);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn test_no_context_result() {
        let result = QueryResult::no_context("what is docanchor?");
        assert!(result.no_context);
        assert!(result.citations.is_empty());
        assert!(result.answer.contains("what is docanchor?"));
        assert!(result.answer.contains("could not find"));
    }
}
