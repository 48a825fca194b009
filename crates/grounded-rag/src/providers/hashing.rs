//! Offline embedder based on feature hashing
//!
//! Useful for development and tests where no embedding model is available.
//! Texts sharing words land close together; there is no semantic understanding.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;

/// Hashes lower-cased alphanumeric tokens into `dimensions` buckets and
/// L2-normalises the result. Deterministic across runs and platforms.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Embed synchronously
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(Error::invalid_config("hashing embedder needs dimensions > 0"));
        }

        let mut v = vec![0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dimensions as u64) as usize;
            // High bit picks the sign so unrelated tokens tend to cancel
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
