//! Prompt types for grounded answering.

use serde::{Deserialize, Serialize};

/// One retrieved chunk presented to the model as context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBlock {
    /// Chunk identifier the model must cite (e.g., "d4f1…:3")
    pub chunk_id: String,

    /// Original filename the chunk came from
    pub source_file: String,

    /// The literal chunk text
    pub text: String,
}

/// A fully assembled generation prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedPrompt {
    /// System message carrying the grounding rules
    pub system: String,

    /// User message carrying the context blocks and the question
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_block_serialization() {
        let block = ContextBlock {
            chunk_id: "doc:0".to_string(),
            source_file: "report.md".to_string(),
            text: "Quarterly results improved.".to_string(),
        };

        let json = serde_json::to_string(&block).unwrap();
        let back: ContextBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chunk_id, block.chunk_id);
        assert_eq!(back.source_file, block.source_file);
        assert_eq!(back.text, block.text);
    }
}
