//! Mock LLM client for tests and offline runs.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docanchor_core::AppResult;

/// Deterministic client that answers by restating the context markers it was
/// given.
///
/// The prompt assembly tags every context block with a `[chunk_id]` marker;
/// this client echoes those markers back, which is enough for the citation
/// mapping downstream to behave exactly as it would with a real model.
#[derive(Debug, Default)]
pub struct MockClient;

impl MockClient {
    pub fn new() -> Self {
        Self
    }

    /// Collect bracketed, whitespace-free tokens from the prompt.
    fn extract_markers(prompt: &str) -> Vec<String> {
        let mut markers = Vec::new();
        let mut rest = prompt;

        while let Some(open) = rest.find('[') {
            rest = &rest[open + 1..];
            let Some(close) = rest.find(']') else { break };
            let candidate = &rest[..close];
            if !candidate.is_empty()
                && !candidate.contains(char::is_whitespace)
                && !markers.iter().any(|m| m == candidate)
            {
                markers.push(candidate.to_string());
            }
            rest = &rest[close + 1..];
        }

        markers
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let markers = Self::extract_markers(&request.prompt);

        let content = if markers.is_empty() {
            "I could not find this information in the provided context.".to_string()
        } else {
            let refs: Vec<String> = markers.iter().map(|m| format!("[{}]", m)).collect();
            format!(
                "Based on the provided context, the relevant passages are {}.",
                refs.join(", ")
            )
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_markers() {
        let client = MockClient::new();
        let request = LlmRequest::new("[doc1:0] first\n\n[doc1:1] second\n\nQuestion: x", "mock");

        let response = client.complete(&request).await.unwrap();
        assert!(response.content.contains("[doc1:0]"));
        assert!(response.content.contains("[doc1:1]"));
    }

    #[tokio::test]
    async fn test_mock_without_markers() {
        let client = MockClient::new();
        let request = LlmRequest::new("no markers here", "mock");

        let response = client.complete(&request).await.unwrap();
        assert!(response.content.contains("could not find"));
    }

    #[test]
    fn test_marker_extraction_dedupes() {
        let markers = MockClient::extract_markers("[a:1] text [a:1] more [b:2]");
        assert_eq!(markers, vec!["a:1".to_string(), "b:2".to_string()]);
    }

    #[test]
    fn test_marker_extraction_skips_prose_brackets() {
        let markers = MockClient::extract_markers("[not a marker] but [id:3] is");
        assert_eq!(markers, vec!["id:3".to_string()]);
    }
}
