//! LLM provider factory.
//!
//! This module provides a factory for creating LLM clients based on
//! application configuration. Swapping generation providers changes only
//! this resolution step, never the orchestration logic.

use crate::client::LlmClient;
use crate::providers::{MockClient, OllamaClient};
use docanchor_core::{AppError, AppResult, GenerationConfig};
use std::sync::Arc;

/// Create an LLM client based on the generation configuration.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(config: &GenerationConfig) -> AppResult<Arc<dyn LlmClient>> {
    match config.provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = config
                .endpoint
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            let client = OllamaClient::with_base_url_and_timeout(base_url, config.timeout());
            Ok(Arc::new(client))
        }
        "mock" => Ok(Arc::new(MockClient::new())),
        other => Err(AppError::Config(format!(
            "Unknown generation provider: '{}'. Supported providers: ollama, mock",
            other
        ))),
    }
}
