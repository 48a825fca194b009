//! grounded-rag: retrieval-augmented question answering over a document directory
//!
//! Documents are split into overlapping character windows, embedded into a
//! validated on-disk vector index, and questions are answered by a language
//! model grounded on the most similar chunks.

pub mod config;
pub mod error;
pub mod generation;
pub mod indexer;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, ProviderError, Result, Stage};
pub use pipeline::{AnsweringPipeline, PipelineState};
pub use retrieval::{SimilarityMetric, VectorIndex};
pub use types::{Answer, Chunk, Document, RetrievalResult, ScoredChunk};
