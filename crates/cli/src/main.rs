//! Docanchor CLI
//!
//! Main entry point for the docanchor command-line tool.
//! Ingests documents into a per-project index and answers questions with
//! citations traceable to exact character ranges.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChunksCommand, SimilarCommand};
use docanchor_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Docanchor CLI - document Q&A with offset-accurate citations
#[derive(Parser, Debug)]
#[command(name = "docanchor")]
#[command(about = "Document Q&A with offset-accurate citations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "DOCANCHOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest documents and answer a question with citations
    Ask(AskCommand),

    /// Ingest documents and list the chunks most similar to a text
    Similar(SimilarCommand),

    /// Show the offset-tagged chunks a file would produce
    Chunks(ChunksCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(cli.config, cli.log_level, cli.verbose, cli.no_color);

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::debug!(
        embed_provider = %config.rag.embedding.provider,
        gen_provider = %config.rag.generation.provider,
        "Docanchor CLI starting"
    );

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Similar(_) => "similar",
        Commands::Chunks(_) => "chunks",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Similar(cmd) => cmd.execute(&config).await,
        Commands::Chunks(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
