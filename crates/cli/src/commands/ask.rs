//! Ask command handler.

use clap::Args;
use docanchor_core::{AppConfig, AppError, AppResult};
use docanchor_rag::{IngestOptions, QueryRequest};
use std::path::PathBuf;

use super::Session;

/// Maximum snippet length shown per citation.
const SNIPPET_LEN: usize = 300;

/// Ingest documents and answer a question with citations
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to answer
    pub question: String,

    /// Files or directories to ingest
    #[arg(long = "path", required = true)]
    pub paths: Vec<PathBuf>,

    /// Number of chunks to retrieve (defaults to config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum similarity score for retrieved chunks
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Chunk size in characters (defaults to config)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Overlap between chunks in characters (defaults to config)
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let session = Session::new(config)?;

        let options = IngestOptions {
            chunk_size: self.chunk_size.unwrap_or(config.rag.chunking.chunk_size),
            overlap: self.overlap.unwrap_or(config.rag.chunking.overlap),
        };

        let summary = session.ingest_paths(&self.paths, &options).await?;
        if summary.documents == 0 {
            return Err(AppError::DocumentLoad(
                "no documents could be ingested from the given paths".to_string(),
            ));
        }
        tracing::info!(
            documents = summary.documents,
            chunks = summary.chunks,
            failures = summary.failures,
            "Corpus ready"
        );

        let top_k = self.top_k.unwrap_or(config.rag.retrieval.top_k);
        let mut request = QueryRequest::new(self.question.clone(), top_k);
        request.score_threshold = self.threshold;

        let result = session.query.answer(session.project_id, &request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        println!("{}", result.answer);

        if !result.citations.is_empty() {
            println!();
            println!("Citations:");
            for citation in &result.citations {
                let marker = if citation.cited { "*" } else { " " };
                println!(
                    "{} [{}] {} (chars {}..{}, score {:.3})",
                    marker,
                    citation.chunk_id,
                    citation.source_file,
                    citation.start_offset,
                    citation.end_offset,
                    citation.score,
                );
                println!("      {}", citation.snippet(SNIPPET_LEN).replace('\n', " "));
            }
        }

        Ok(())
    }
}
