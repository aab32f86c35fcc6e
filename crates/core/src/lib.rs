//! Docanchor Core Library
//!
//! This crate provides the foundational utilities for the docanchor pipeline:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Pipeline configuration

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{
    AppConfig, ChunkingConfig, EmbeddingConfig, GenerationConfig, PipelineConfig, RagConfig,
    RetrievalConfig, RetryPolicy,
};
pub use error::{AppError, AppResult};
