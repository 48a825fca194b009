//! Configuration for the RAG pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retrieval::SimilarityMetric;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "GROUNDED_RAG_";

/// Upper bound on the per-question deadline (one day)
pub const MAX_ANSWER_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Main RAG configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Document source configuration
    pub documents: DocumentsConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Persisted index configuration
    pub index: IndexConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Prompt configuration
    pub prompt: PromptConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, apply environment overrides and validate.
    ///
    /// A missing `path` yields the defaults with overrides applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse TOML text without overrides or validation
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::invalid_config(format!("Invalid TOML: {}", e)))
    }

    /// Apply `GROUNDED_RAG_*` overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = var("DATA_DIR") {
            self.documents.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("INDEX_PATH") {
            self.index.storage_path = PathBuf::from(v);
        }
        if let Some(v) = var("LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = var("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = var("GENERATE_MODEL") {
            self.llm.generate_model = v;
        }
        if let Some(v) = var("EMBED_MODEL") {
            self.embeddings.model = v;
        }
    }

    /// Reject parameter combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::invalid_config("chunking.chunk_size must be > 0"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::invalid_config(format!(
                "chunking.chunk_overlap ({}) must be < chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::invalid_config("embeddings.dimensions must be > 0"));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::invalid_config("embeddings.batch_size must be > 0"));
        }
        if self.embeddings.concurrency == 0 {
            return Err(Error::invalid_config("embeddings.concurrency must be > 0"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::invalid_config("retrieval.top_k must be > 0"));
        }
        if self.retrieval.answer_timeout_secs == 0 {
            return Err(Error::invalid_config("retrieval.answer_timeout_secs must be > 0"));
        }
        if self.retrieval.answer_timeout_secs > MAX_ANSWER_TIMEOUT_SECS {
            return Err(Error::invalid_config(format!(
                "retrieval.answer_timeout_secs must be at most {}",
                MAX_ANSWER_TIMEOUT_SECS
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(Error::invalid_config("llm.max_tokens must be > 0"));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Document source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Directory scanned for source documents
    pub data_dir: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 500,
        }
    }
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama server
    #[default]
    Ollama,
    /// Offline feature hashing, no model required
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding backend
    pub provider: EmbeddingBackend,
    /// Model name (ignored by the hashing backend)
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Embedding requests in flight during an index build
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Ollama,
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            concurrency: 2,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL, shared by the embedding backend
    pub base_url: String,
    /// Bearer token sent when the server sits behind an authenticating proxy
    pub api_key: Option<String>,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            generate_model: "llama3:70b".to_string(),
            temperature: 0.5,
            max_tokens: 512,
            timeout_secs: 120,
            max_retries: 2,
            retry_base_delay_ms: 1000,
        }
    }
}

/// Persisted index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index file location
    pub storage_path: PathBuf,
    /// Similarity metric used for new builds
    pub metric: SimilarityMetric,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("grounded-rag")
            .join("index.grix");

        Self {
            storage_path,
            metric: SimilarityMetric::Cosine,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Overall deadline for one answer in seconds
    pub answer_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            answer_timeout_secs: 300,
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Minimum answer length requested from the model
    pub min_words: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { min_words: 250 }
    }
}
