//! Full index rebuild: load documents, chunk, embed, save

use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::{DocumentSource, TextChunker};
use crate::providers::EmbeddingProvider;
use crate::retrieval::VectorIndex;

/// Build a fresh index from `source` and persist it at the configured path.
///
/// The previous index file is replaced only after the new one is fully
/// written, so a failed rebuild leaves it untouched.
pub async fn rebuild_index(
    config: &RagConfig,
    source: Arc<dyn DocumentSource>,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorIndex> {
    let start = Instant::now();
    let chunker = TextChunker::from_config(&config.chunking)?;

    let documents = tokio::task::spawn_blocking(move || source.load_documents())
        .await
        .map_err(|e| Error::internal(format!("document loading task failed: {}", e)))??;

    let chunks = chunker.chunk_all(&documents);
    tracing::info!(
        "Chunked {} documents into {} chunks (size {}, overlap {})",
        documents.len(),
        chunks.len(),
        chunker.max_size(),
        chunker.overlap()
    );

    let index = VectorIndex::build(
        chunks,
        embedder,
        config.index.metric,
        config.embeddings.batch_size,
        config.embeddings.concurrency,
    )
    .await?;

    let path = config.index.storage_path.clone();
    let index = tokio::task::spawn_blocking(move || index.save(&path).map(|_| index))
        .await
        .map_err(|e| Error::internal(format!("index save task failed: {}", e)))??;

    tracing::info!(
        "Index rebuilt in {:?} ({} entries)",
        start.elapsed(),
        index.len()
    );
    Ok(index)
}
