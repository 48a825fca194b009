//! Provider abstractions for embeddings and answer generation
//!
//! Trait-based so the pipeline can run against Ollama, the offline
//! hashing embedder, or test doubles.

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use hashing::HashingEmbedder;
pub use llm::LlmProvider;
pub use ollama::{OllamaEmbedder, OllamaLlm};

use std::sync::Arc;

use crate::config::{EmbeddingBackend, RagConfig};
use crate::error::Result;
use crate::generation::OllamaClient;

/// Build the configured embedding and generation providers, sharing one HTTP client
pub fn from_config(config: &RagConfig) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>)> {
    let client = Arc::new(OllamaClient::new(&config.llm)?);

    let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.provider {
        EmbeddingBackend::Ollama => {
            tracing::info!(
                "Using Ollama embeddings ({}, {} dims)",
                config.embeddings.model,
                config.embeddings.dimensions
            );
            Arc::new(OllamaEmbedder::from_client(
                Arc::clone(&client),
                config.embeddings.dimensions,
                config.embeddings.model.clone(),
            ))
        }
        EmbeddingBackend::Hashing => {
            tracing::info!("Using hashing embeddings ({} dims)", config.embeddings.dimensions);
            Arc::new(HashingEmbedder::new(config.embeddings.dimensions))
        }
    };

    let llm: Arc<dyn LlmProvider> =
        Arc::new(OllamaLlm::from_client(client, config.llm.generate_model.clone()));

    Ok((embedder, llm))
}
