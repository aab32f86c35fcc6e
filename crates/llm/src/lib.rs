//! LLM integration crate for docanchor.
//!
//! This crate provides a provider-agnostic abstraction for the generation
//! capability used to synthesize answers. Providers are swappable behind the
//! [`LlmClient`] trait; the orchestration layer never knows which one is
//! active.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Mock**: Deterministic client for tests and offline runs
//!
//! # Example
//! ```no_run
//! use docanchor_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{MockClient, OllamaClient};
