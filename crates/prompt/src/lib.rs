//! Prompt assembly for docanchor.
//!
//! This crate builds the generation request for a grounded answer:
//! - Retrieved chunk texts, each tagged with its chunk identifier
//! - Instructions to answer strictly from the provided context
//! - Instructions to reference the chunk identifier of every claim
//!
//! Templates are rendered with Handlebars so the context layout stays
//! declarative and testable.

pub mod builder;
pub mod types;

// Re-export main types
pub use builder::build_grounded_prompt;
pub use types::{ContextBlock, GroundedPrompt};
