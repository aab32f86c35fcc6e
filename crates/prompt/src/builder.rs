//! Builder for grounded-answer prompts.

use crate::types::{ContextBlock, GroundedPrompt};
use docanchor_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde_json::json;

/// User-message template. Each context block is tagged with its chunk id so
/// the model can reference it inline.
const USER_TEMPLATE: &str = "\
Context passages:

{{#each context}}\
[{{chunk_id}}] (source: {{source_file}})
{{text}}

---

{{/each}}\
Question: {{question}}
";

/// System message carrying the grounding rules.
///
/// The rules are strict on purpose: the answer must be derivable from the
/// context alone, and every claim must carry the chunk identifier it came
/// from, so the caller can map answer sentences back to citations.
const SYSTEM_PROMPT: &str = "\
You are a document assistant. Answer the question using ONLY the context passages provided.

Rules:
- Base every statement on the context passages. Do not use any outside knowledge.
- After each claim, reference the passage it came from by writing its identifier in square brackets, e.g. [abc123:0].
- If several passages support a claim, reference each of them.
- If the context does not contain the answer, reply exactly: \"I could not find this information in the provided context.\"
- Do not invent passage identifiers. Only use identifiers that appear in the context.
";

/// Build a generation prompt from the question and retrieved context.
///
/// # Arguments
/// * `question` - The user's question
/// * `context` - Retrieved chunks, already ordered by relevance
///
/// # Errors
/// Returns `AppError::Other` if template rendering fails (malformed template,
/// which would be a programming error rather than user input).
pub fn build_grounded_prompt(
    question: &str,
    context: &[ContextBlock],
) -> AppResult<GroundedPrompt> {
    tracing::debug!(blocks = context.len(), "Assembling grounded prompt");

    let mut handlebars = Handlebars::new();

    // Plain text output, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("grounded", USER_TEMPLATE)
        .map_err(|e| AppError::Other(format!("Failed to register prompt template: {}", e)))?;

    let user = handlebars
        .render(
            "grounded",
            &json!({
                "question": question,
                "context": context,
            }),
        )
        .map_err(|e| AppError::Other(format!("Failed to render prompt template: {}", e)))?;

    Ok(GroundedPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> Vec<ContextBlock> {
        vec![
            ContextBlock {
                chunk_id: "doc1:0".to_string(),
                source_file: "report.pdf".to_string(),
                text: "Revenue grew 12% in Q3.".to_string(),
            },
            ContextBlock {
                chunk_id: "doc1:1".to_string(),
                source_file: "report.pdf".to_string(),
                text: "Costs were flat year over year.".to_string(),
            },
        ]
    }

    #[test]
    fn test_user_prompt_tags_every_block() {
        let prompt = build_grounded_prompt("How did revenue develop?", &sample_context()).unwrap();

        assert!(prompt.user.contains("[doc1:0]"));
        assert!(prompt.user.contains("[doc1:1]"));
        assert!(prompt.user.contains("Revenue grew 12% in Q3."));
        assert!(prompt.user.contains("Costs were flat year over year."));
        assert!(prompt.user.contains("Question: How did revenue develop?"));
    }

    #[test]
    fn test_system_prompt_forbids_outside_knowledge() {
        let prompt = build_grounded_prompt("q", &sample_context()).unwrap();

        assert!(prompt.system.contains("ONLY the context passages"));
        assert!(prompt.system.contains("Do not use any outside knowledge"));
        assert!(prompt.system.contains("square brackets"));
        assert!(prompt
            .system
            .contains("could not find this information"));
    }

    #[test]
    fn test_context_text_is_not_escaped() {
        let context = vec![ContextBlock {
            chunk_id: "d:0".to_string(),
            source_file: "notes.md".to_string(),
            text: "a < b && c > d".to_string(),
        }];

        let prompt = build_grounded_prompt("q", &context).unwrap();
        assert!(prompt.user.contains("a < b && c > d"));
    }

    #[test]
    fn test_empty_context_renders_question_only() {
        let prompt = build_grounded_prompt("anything here?", &[]).unwrap();
        assert!(prompt.user.contains("Question: anything here?"));
        assert!(!prompt.user.contains("(source:"));
    }
}
