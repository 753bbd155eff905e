//! Mock LLM provider: deterministic responses for running without a model.
//!
//! Recognizes the pipeline's own prompt shapes: candidate requests get a
//! JSON array, perception requests an empty JSON object, and rendering
//! requests echo the draft back.

use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

fn line_after<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix(label))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(&self, system: &str, prompt: &str, _params: CompletionParams) -> Result<String> {
        if system.contains("JSON array") {
            let topic = line_after(prompt, "User:").unwrap_or("that");
            let candidates = serde_json::json!([
                {"style": "warm", "content": format!("Thanks for telling me about {topic}. I'm here with you.")},
                {"style": "direct", "content": format!("Noted: {topic}. Want me to help with a next step?")},
            ]);
            return Ok(candidates.to_string());
        }
        if system.contains("JSON object") {
            return Ok("{}".to_string());
        }
        Ok(line_after(prompt, "Draft:")
            .map(str::to_string)
            .unwrap_or_else(|| format!("(Mock {} Response) I received your prompt.", self.model)))
    }
}
