//! In-memory vector index with exact similarity search

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::{Chunk, RetrievalResult, ScoredChunk};

use super::metric::SimilarityMetric;

/// A chunk and its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Ordered, immutable collection of embedded chunks.
///
/// Replaced wholesale on rebuild; share between readers as `Arc<VectorIndex>`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub(crate) metric: SimilarityMetric,
    pub(crate) dimension: usize,
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) embedder: String,
    pub(crate) built_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Embed `chunks` and build an index over them.
    ///
    /// Batches of `batch_size` texts go to `embed_batch`, with up to
    /// `concurrency` batches in flight. Entry order follows chunk order.
    /// Any embedding failure fails the whole build.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        metric: SimilarityMetric,
        batch_size: usize,
        concurrency: usize,
    ) -> Result<Self> {
        let dimension = embedder.dimensions();
        if dimension == 0 {
            return Err(Error::invalid_config("embedder reports zero dimensions"));
        }
        if batch_size == 0 {
            return Err(Error::invalid_argument("batch_size must be > 0"));
        }

        tracing::info!(
            "Building index: {} chunks, {} dims, metric {}, batch {} x{}",
            chunks.len(),
            dimension,
            metric,
            batch_size,
            concurrency.max(1)
        );

        let text_batches: Vec<Vec<String>> = chunks
            .chunks(batch_size)
            .map(|batch| batch.iter().map(|c| c.text.clone()).collect())
            .collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(text_batches)
            .map(|texts: Vec<String>| async move {
                let vectors = embedder.embed_batch(&texts).await.map_err(as_embedding_error)?;
                if vectors.len() != texts.len() {
                    return Err(Error::embedding(format!(
                        "{} returned {} vectors for {} texts",
                        embedder.name(),
                        vectors.len(),
                        texts.len()
                    )));
                }
                Ok(vectors)
            })
            .buffered(concurrency.max(1))
            .try_collect()
            .await?;

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(batches.into_iter().flatten()) {
            if vector.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if !is_finite(&vector) {
                return Err(Error::embedding(format!(
                    "{} returned non-finite components for chunk {} of {}",
                    embedder.name(),
                    chunk.chunk_index,
                    chunk.document_id
                )));
            }
            entries.push(IndexEntry { chunk, vector });
        }

        tracing::info!("Index built with {} entries", entries.len());

        Ok(Self {
            metric,
            dimension,
            entries,
            embedder: embedder.name().to_string(),
            built_at: Utc::now(),
        })
    }

    /// Assemble an index from already embedded entries
    pub fn from_entries(
        entries: Vec<IndexEntry>,
        metric: SimilarityMetric,
        dimension: usize,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::invalid_config("index dimension must be > 0"));
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.vector.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: entry.vector.len(),
                });
            }
            if !is_finite(&entry.vector) {
                return Err(Error::invalid_argument(format!(
                    "entry {} has non-finite components",
                    i
                )));
            }
        }
        Ok(Self {
            metric,
            dimension,
            entries,
            embedder: "external".to_string(),
            built_at: Utc::now(),
        })
    }

    /// Top `k` entries by descending score; ties keep insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::invalid_argument("k must be > 0"));
        }
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let score = self.metric.score(query, &entry.vector);
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(RetrievalResult::new(
            scored
                .into_iter()
                .map(|(i, score)| ScoredChunk {
                    chunk: self.entries[i].chunk.clone(),
                    score,
                })
                .collect(),
        ))
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Name of the embedding provider that produced the vectors
    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Number of distinct source documents
    pub fn document_count(&self) -> usize {
        let mut ids: Vec<&str> = self
            .entries
            .iter()
            .map(|e| e.chunk.document_id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

/// Only finite vectors can be saved and loaded back
fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

/// Provider failures during a build surface as embedding errors
fn as_embedding_error(err: Error) -> Error {
    match err {
        e @ (Error::Embedding(_) | Error::DimensionMismatch { .. }) => e,
        other => Error::embedding(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::HashingEmbedder;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            document_id: id.to_string(),
            source_path: id.to_string(),
            page: None,
            chunk_index: 0,
            start_offset: 0,
            end_offset: text.chars().count(),
            text: text.to_string(),
        }
    }

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: chunk(id, id),
            vector,
        }
    }

    #[test]
    fn test_search_orders_by_score() {
        let index = VectorIndex::from_entries(
            vec![
                entry("a", vec![0.0, 1.0]),
                entry("b", vec![1.0, 0.0]),
                entry("c", vec![0.7, 0.7]),
            ],
            SimilarityMetric::Cosine,
            2,
        )
        .unwrap();

        let result = index.search(&[1.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = result.iter().map(|s| s.chunk.document_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(result.chunks[0].score >= result.chunks[1].score);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = VectorIndex::from_entries(
            vec![
                entry("first", vec![1.0, 0.0]),
                entry("other", vec![0.0, 1.0]),
                entry("second", vec![1.0, 0.0]),
            ],
            SimilarityMetric::DotProduct,
            2,
        )
        .unwrap();

        let result = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = result.iter().map(|s| s.chunk.document_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "other"]);
    }

    #[test]
    fn test_k_larger_than_index_returns_all() {
        let index = VectorIndex::from_entries(
            vec![entry("a", vec![1.0]), entry("b", vec![0.5])],
            SimilarityMetric::Euclidean,
            1,
        )
        .unwrap();
        assert_eq!(index.search(&[1.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn test_search_rejects_bad_arguments() {
        let index =
            VectorIndex::from_entries(vec![entry("a", vec![1.0, 0.0])], SimilarityMetric::Cosine, 2)
                .unwrap();

        assert!(matches!(index.search(&[1.0, 0.0], 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_nan_scores_rank_last() {
        // inf - inf under the dot product
        let index = VectorIndex::from_entries(
            vec![entry("nan", vec![f32::MAX, f32::MAX]), entry("ok", vec![-1.0, 0.0])],
            SimilarityMetric::DotProduct,
            2,
        )
        .unwrap();

        let result = index.search(&[f32::MAX, -f32::MAX], 2).unwrap();
        assert_eq!(result.chunks[0].chunk.document_id, "ok");
        assert_eq!(result.chunks[1].chunk.document_id, "nan");
        assert_eq!(result.chunks[1].score, f32::NEG_INFINITY);
    }

    #[test]
    fn test_from_entries_rejects_non_finite_vectors() {
        let err = VectorIndex::from_entries(
            vec![entry("ok", vec![1.0]), entry("bad", vec![f32::INFINITY])],
            SimilarityMetric::Cosine,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_build_preserves_chunk_order_across_batches() {
        let chunks: Vec<Chunk> = (0..7)
            .map(|i| chunk(&format!("doc{}", i), &format!("text number {}", i)))
            .collect();
        let embedder = HashingEmbedder::new(32);

        let index = VectorIndex::build(chunks.clone(), &embedder, SimilarityMetric::Cosine, 2, 3)
            .await
            .unwrap();

        assert_eq!(index.len(), 7);
        assert_eq!(index.dimension(), 32);
        assert_eq!(index.embedder(), "hashing");
        for (entry, original) in index.entries().iter().zip(&chunks) {
            assert_eq!(&entry.chunk, original);
            assert_eq!(entry.vector, embedder.embed_text(&original.text).unwrap());
        }
    }

    #[tokio::test]
    async fn test_build_with_no_chunks_is_empty() {
        let index = VectorIndex::build(Vec::new(), &HashingEmbedder::new(8), SimilarityMetric::Cosine, 4, 1)
            .await
            .unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[0.0; 8], 3).unwrap().is_empty());
    }
}
