//! LLM provider trait for generating answers

use async_trait::async_trait;
use crate::error::Result;

/// Trait for prompt completion
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3, phi3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a fully assembled prompt, producing at most `max_tokens` tokens
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
