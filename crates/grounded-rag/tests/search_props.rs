//! Property tests for exact similarity search

use proptest::prelude::*;

use grounded_rag::retrieval::{IndexEntry, SimilarityMetric, VectorIndex};
use grounded_rag::types::Chunk;

fn metric() -> impl Strategy<Value = SimilarityMetric> {
    prop_oneof![
        Just(SimilarityMetric::Cosine),
        Just(SimilarityMetric::DotProduct),
        Just(SimilarityMetric::Euclidean),
    ]
}

/// Dimension, entry vectors and a query of that dimension
fn index_and_query() -> impl Strategy<Value = (usize, Vec<Vec<f32>>, Vec<f32>)> {
    (1usize..8).prop_flat_map(|dim| {
        (
            Just(dim),
            prop::collection::vec(prop::collection::vec(-10.0f32..10.0, dim), 0..40),
            prop::collection::vec(-10.0f32..10.0, dim),
        )
    })
}

fn entry(i: usize, vector: Vec<f32>) -> IndexEntry {
    let text = format!("chunk {}", i);
    IndexEntry {
        chunk: Chunk {
            document_id: format!("doc{}", i),
            source_path: format!("doc{}.txt", i),
            page: None,
            chunk_index: 0,
            start_offset: 0,
            end_offset: text.chars().count(),
            text,
        },
        vector,
    }
}

proptest! {
    #[test]
    fn scores_are_non_increasing(
        (dim, vectors, query) in index_and_query(),
        metric in metric(),
        k in 1usize..50,
    ) {
        let n = vectors.len();
        let entries = vectors.into_iter().enumerate().map(|(i, v)| entry(i, v)).collect();
        let index = VectorIndex::from_entries(entries, metric, dim).unwrap();

        let result = index.search(&query, k).unwrap();
        prop_assert_eq!(result.len(), k.min(n));
        for pair in result.chunks.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn top_k_is_a_prefix_of_a_larger_search(
        (dim, vectors, query) in index_and_query(),
        metric in metric(),
        k in 1usize..20,
    ) {
        let entries = vectors.into_iter().enumerate().map(|(i, v)| entry(i, v)).collect();
        let index = VectorIndex::from_entries(entries, metric, dim).unwrap();

        let small = index.search(&query, k).unwrap();
        let large = index.search(&query, k + 10).unwrap();
        prop_assert_eq!(&small.chunks[..], &large.chunks[..small.len()]);
    }
}
