//! Retrieval results and answers

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// A retrieved chunk with its similarity score (higher is more similar)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks ranked by non-increasing score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(chunks: Vec<ScoredChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.chunks.iter()
    }
}

/// Generated answer and the chunks it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: RetrievalResult,
}
