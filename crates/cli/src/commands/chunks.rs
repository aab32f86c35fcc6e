//! Chunks command handler.
//!
//! Dry run of the chunker against one file, showing the exact offsets each
//! chunk would be cited with.

use clap::Args;
use docanchor_core::{AppConfig, AppResult};
use docanchor_rag::{chunker, DocumentLoader, FsLoader};
use std::path::PathBuf;
use uuid::Uuid;

/// Show the offset-tagged chunks a file would produce
#[derive(Args, Debug)]
pub struct ChunksCommand {
    /// File to chunk
    pub file: PathBuf,

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

impl ChunksCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let chunk_size = self.chunk_size.unwrap_or(config.rag.chunking.chunk_size);
        let overlap = self.overlap.unwrap_or(config.rag.chunking.overlap);

        let loader = FsLoader::new();
        let text = loader.load(&self.file).await?;
        let chunks = chunker::chunk(Uuid::new_v4(), &text, chunk_size, overlap)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&chunks)?);
            return Ok(());
        }

        println!(
            "{} chunks (chunk_size {}, overlap {}, {} chars total)",
            chunks.len(),
            chunk_size,
            overlap,
            text.chars().count()
        );

        for chunk in &chunks {
            let preview: String = chunk.text.chars().take(60).collect();
            println!(
                "  #{:<4} [{:>7}..{:<7}) {}",
                chunk.seq,
                chunk.start_offset,
                chunk.end_offset,
                preview.replace('\n', " ")
            );
        }

        Ok(())
    }
}
