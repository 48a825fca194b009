//! Similarity metrics; every metric scores higher for more similar vectors

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Similarity metric fixed for an index at build time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity; zero-norm vectors score 0
    #[default]
    Cosine,
    /// Raw inner product
    #[serde(rename = "dot")]
    DotProduct,
    /// `1 / (1 + euclidean distance)`
    Euclidean,
}

impl SimilarityMetric {
    /// Stable identifier used in the index file header
    pub fn id(self) -> u8 {
        match self {
            Self::Cosine => 0,
            Self::DotProduct => 1,
            Self::Euclidean => 2,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Cosine),
            1 => Ok(Self::DotProduct),
            2 => Ok(Self::Euclidean),
            other => Err(Error::index_load(format!("unknown metric id {}", other))),
        }
    }

    /// Score two vectors of equal length
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Cosine => {
                let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    na += x * x;
                    nb += y * y;
                }
                if na == 0.0 || nb == 0.0 {
                    return 0.0;
                }
                dot / (na.sqrt() * nb.sqrt())
            }
            Self::DotProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Self::Euclidean => {
                let dist = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cosine => "cosine",
            Self::DotProduct => "dot",
            Self::Euclidean => "euclidean",
        };
        f.write_str(name)
    }
}
