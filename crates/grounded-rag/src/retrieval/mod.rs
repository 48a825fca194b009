//! Vector index, similarity metrics, persistence and retrieval

pub mod index;
pub mod metric;
pub mod persist;
pub mod retriever;

pub use index::{IndexEntry, VectorIndex};
pub use metric::SimilarityMetric;
pub use persist::IndexHeader;
pub use retriever::retrieve;
