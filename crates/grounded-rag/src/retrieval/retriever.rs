//! Query-time retrieval: embed the question, search the index

use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::types::RetrievalResult;

use super::index::VectorIndex;

/// Embed `query` once and return the `k` most similar chunks.
///
/// Embedding errors propagate unchanged. Empty queries are embedded as-is.
pub async fn retrieve(
    index: &VectorIndex,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
) -> Result<RetrievalResult> {
    let query_vector = embedder.embed(query).await?;
    let result = index.search(&query_vector, k)?;

    tracing::debug!(
        "Retrieved {} of {} chunks (top score {:?})",
        result.len(),
        index.len(),
        result.chunks.first().map(|c| c.score)
    );

    Ok(result)
}
