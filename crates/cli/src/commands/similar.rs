//! Similar command handler.
//!
//! Retrieval without generation: useful for checking what the index would
//! hand the model before trusting an answer.

use clap::Args;
use docanchor_core::{AppConfig, AppError, AppResult};
use docanchor_rag::{IngestOptions, QueryRequest};
use std::path::PathBuf;

use super::Session;

const SNIPPET_LEN: usize = 300;

/// Ingest documents and list the chunks most similar to a text
#[derive(Args, Debug)]
pub struct SimilarCommand {
    /// The text to match against
    pub text: String,

    /// Files or directories to ingest
    #[arg(long = "path", required = true)]
    pub paths: Vec<PathBuf>,

    /// Number of chunks to retrieve (defaults to config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum similarity score for retrieved chunks
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SimilarCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let session = Session::new(config)?;

        let options = IngestOptions {
            chunk_size: config.rag.chunking.chunk_size,
            overlap: config.rag.chunking.overlap,
        };

        let summary = session.ingest_paths(&self.paths, &options).await?;
        if summary.documents == 0 {
            return Err(AppError::DocumentLoad(
                "no documents could be ingested from the given paths".to_string(),
            ));
        }

        let top_k = self.top_k.unwrap_or(config.rag.retrieval.top_k);
        let mut request = QueryRequest::new(self.text.clone(), top_k);
        request.score_threshold = self.threshold;

        let citations = session.query.similar(session.project_id, &request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&citations)?);
            return Ok(());
        }

        if citations.is_empty() {
            println!("No similar chunks found.");
            return Ok(());
        }

        for citation in &citations {
            println!(
                "[{}] {} (chars {}..{}, score {:.3})",
                citation.chunk_id,
                citation.source_file,
                citation.start_offset,
                citation.end_offset,
                citation.score,
            );
            println!("    {}", citation.snippet(SNIPPET_LEN).replace('\n', " "));
        }

        Ok(())
    }
}
