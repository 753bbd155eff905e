use anyhow::Result;
use async_trait::async_trait;
use hearth_core::config::LlmConfig;
use std::sync::Arc;

/// Parameters for a single completion
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

impl From<&LlmConfig> for CompletionParams {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature.clamp(0.0, 2.0),
        }
    }
}

/// Text-generation collaborator. The output is opaque text; callers parse
/// whatever structure they asked for and tolerate anything else.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str, params: CompletionParams) -> Result<String>;
}

/// Build the configured client. Only the offline mock ships with the core;
/// hosts bring their own providers through [`LlmClient`].
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(crate::providers::mock::MockProvider::new(&config.model))),
        other => anyhow::bail!("Unknown LLM provider: {other} (available: mock)"),
    }
}
