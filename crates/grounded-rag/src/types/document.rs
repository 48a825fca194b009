//! Document and chunk types with source tracking

use serde::{Deserialize, Serialize};

/// A unit of source text, one per file or one per PDF page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier derived from the relative path and page
    pub id: String,
    /// Path relative to the data directory
    pub source_path: String,
    /// 1-based page number for paginated sources
    pub page: Option<u32>,
    /// Extracted text
    pub text: String,
}

impl Document {
    /// Create a document, deriving its id from path and page
    pub fn new(source_path: impl Into<String>, page: Option<u32>, text: impl Into<String>) -> Self {
        let source_path = source_path.into();
        let id = match page {
            Some(p) => format!("{}#p{}", source_path, p),
            None => source_path.clone(),
        };
        Self {
            id,
            source_path,
            page,
            text: text.into(),
        }
    }
}

/// A contiguous window of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning document id
    pub document_id: String,
    /// Path of the owning document
    pub source_path: String,
    /// Page of the owning document
    pub page: Option<u32>,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// First character offset (inclusive)
    pub start_offset: usize,
    /// Last character offset (exclusive)
    pub end_offset: usize,
    /// Chunk text, equal to the document characters in `start_offset..end_offset`
    pub text: String,
}

impl Chunk {
    /// Human-readable source reference, e.g. `guide.pdf, Page 3`
    pub fn source_ref(&self) -> String {
        match self.page {
            Some(p) => format!("{}, Page {}", self.source_path, p),
            None => self.source_path.clone(),
        }
    }
}
