//! Sliding-window text chunking with character offsets

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Fixed-window chunker: windows of `max_size` characters, consecutive windows
/// sharing `overlap` characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    /// Window size in characters
    max_size: usize,
    /// Characters shared by consecutive chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker, rejecting `max_size == 0` and `overlap >= max_size`
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::invalid_config("chunk max_size must be > 0"));
        }
        if overlap >= max_size {
            return Err(Error::invalid_config(format!(
                "chunk overlap ({}) must be smaller than max_size ({})",
                overlap, max_size
            )));
        }
        Ok(Self { max_size, overlap })
    }

    /// Create from configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of consecutive chunks
    pub fn step(&self) -> usize {
        self.max_size - self.overlap
    }

    /// Split one document. Empty text yields no chunks.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        // Byte offset of every char boundary, plus the end of the text
        let boundaries: Vec<usize> = document
            .text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(document.text.len()))
            .collect();
        let total = boundaries.len() - 1;

        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0usize;
        loop {
            let end = (start + self.max_size).min(total);
            chunks.push(Chunk {
                document_id: document.id.clone(),
                source_path: document.source_path.clone(),
                page: document.page,
                chunk_index: chunks.len(),
                start_offset: start,
                end_offset: end,
                text: document.text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == total {
                break;
            }
            start += self.step();
        }

        chunks
    }

    /// Split a document set; chunks come out in document order, then window order
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.chunk(doc)).collect()
    }
}

/// Convenience wrapper over [`TextChunker`]
pub fn chunk(document: &Document, max_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(TextChunker::new(max_size, overlap)?.chunk(document))
}
