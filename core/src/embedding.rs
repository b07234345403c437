//! Deterministic feature-hashing embedder.
//!
//! Each normalized token is hashed with 64-bit FNV-1a; the low bits pick a
//! bucket and the top bit picks a sign. The bucket counts are L2-normalized.
//! No model is needed, so the binaries can run end to end; any real embedding
//! model can replace it through the [`Embedder`] trait.

use crate::error::EmbedError;
use crate::tokenizer::RegexNormalizer;
use crate::traits::{Embedder, TextNormalizer};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub const DEFAULT_DIMENSION: usize = 256;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    normalizer: RegexNormalizer,
}

impl HashingEmbedder {
    pub fn new(dimension: usize, normalizer: RegexNormalizer) -> Self {
        Self { dimension: dimension.max(1), normalizer }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION, RegexNormalizer::default())
    }
}

impl Embedder for HashingEmbedder {
    /// Text without any token embeds to the zero vector, which scores 0 against everything.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v = vec![0.0f32; self.dimension];
        for token in self.normalizer.normalize(text) {
            let h = fnv1a(token.as_bytes());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() { *x /= norm; }
        }
        Ok(v)
    }

    fn dimension(&self) -> Option<usize> { Some(self.dimension) }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}
