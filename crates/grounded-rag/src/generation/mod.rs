//! Answer generation: the Ollama client and prompt assembly

pub mod ollama;
pub mod prompt;

pub use ollama::OllamaClient;
pub use prompt::PromptBuilder;
