//! Document loading and chunking

pub mod chunker;
pub mod loader;

pub use chunker::TextChunker;
pub use loader::{DirectoryLoader, DocumentSource};
