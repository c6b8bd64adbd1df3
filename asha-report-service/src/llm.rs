//! Gemini completion helper shared by the summarization and translation
//! adapters: one ordered list of model names, first success wins.

use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;
use thiserror::Error;
use tracing::{info, warn};

/// Models tried in order. The flash model is cheaper and almost always
/// available; the pro model is the fallback.
pub const GEMINI_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro"];

#[derive(Debug, Error)]
pub enum CompletionError {
    /// Every model in the chain failed; carries the last error seen.
    #[error("all models failed: {0}")]
    AllModelsFailed(String),
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    /// Model that produced the response.
    pub model: String,
}

/// Ordered-fallback completion chain over the Gemini API.
#[derive(Clone)]
pub struct ModelChain {
    api_key: String,
    models: Vec<String>,
}

impl ModelChain {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            models: GEMINI_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[cfg(test)]
    pub fn with_models(api_key: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            api_key: api_key.into(),
            models,
        }
    }

    /// Send the prompt to each model in order and return the first success.
    /// Exhausting the list yields a single aggregated failure, not a
    /// per-model error list.
    pub async fn complete(&self, preamble: &str, prompt: &str) -> Result<Completion, CompletionError> {
        let mut last_error = "no models configured".to_string();

        for model in &self.models {
            match self.complete_with(model, preamble, prompt).await {
                Ok(text) => {
                    info!(model = %model, chars = text.len(), "completion succeeded");
                    return Ok(Completion {
                        text,
                        model: model.clone(),
                    });
                }
                Err(err) => {
                    warn!(model = %model, error = %err, "model call failed, trying next");
                    last_error = err.to_string();
                }
            }
        }

        Err(CompletionError::AllModelsFailed(last_error))
    }

    async fn complete_with(&self, model: &str, preamble: &str, prompt: &str) -> anyhow::Result<String> {
        let client = gemini::Client::new(&self.api_key);
        let agent = client.agent(model).preamble(preamble).build();
        Ok(agent.prompt(prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausting_the_chain_yields_one_aggregated_failure() {
        let chain = ModelChain::with_models("test-key", Vec::new());
        let result = chain.complete("preamble", "prompt").await;
        let CompletionError::AllModelsFailed(message) = result.err().unwrap();
        assert_eq!(message, "no models configured");
    }

    #[test]
    fn the_model_list_is_ordered_with_flash_first() {
        assert_eq!(GEMINI_MODELS, ["gemini-1.5-flash", "gemini-1.5-pro"]);
    }
}
