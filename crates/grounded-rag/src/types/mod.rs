//! Core data types for documents, chunks and answers

pub mod answer;
pub mod document;

pub use answer::{Answer, RetrievalResult, ScoredChunk};
pub use document::{Chunk, Document};
