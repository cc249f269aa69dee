use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::utils::text::split_into_words;

/// Text-to-vector backend for the semantic similarity signal. Any backend
/// satisfying this contract (sentence embeddings, a served model, the
/// hashed bag-of-words default) is a valid scoring strategy; the scorer
/// only sees vectors.
pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
    fn dimension(&self) -> usize;
}

/// Deterministic hashed bag-of-words embedder. Every token hashes to a
/// fixed pseudo-random direction; a text maps to the normalized sum of its
/// token vectors, so texts sharing vocabulary land close in cosine space.
/// Needs no model assets and is reproducible across runs and machines.
pub struct HashedBowEmbedder {
    dimension: usize,
}

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 256;

impl HashedBowEmbedder {
    pub fn new(dimension: usize) -> Self {
        HashedBowEmbedder { dimension }
    }

    fn token_vector(&self, token: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            i.hash(&mut hasher);
            let hash = hasher.finish();
            // Map the hash to [-1.0, 1.0]
            vector.push((hash as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32);
        }
        vector
    }
}

impl Default for HashedBowEmbedder {
    fn default() -> Self {
        HashedBowEmbedder::new(DEFAULT_EMBEDDING_DIMENSION)
    }
}

impl TextEmbedder for HashedBowEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut accumulator = vec![0.0f32; self.dimension];
        for word in split_into_words(text) {
            let token = word.to_lowercase();
            for (slot, value) in accumulator.iter_mut().zip(self.token_vector(&token)) {
                *slot += value;
            }
        }
        normalize(&mut accumulator);
        accumulator
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Cosine similarity of two vectors; 0.0 when either is a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let embedder = HashedBowEmbedder::default();
        assert_eq!(embedder.embed("blue widget"), embedder.embed("blue widget"));
    }

    #[test]
    fn shared_vocabulary_raises_similarity() {
        let embedder = HashedBowEmbedder::default();
        let keyword = embedder.embed("widget");
        let related = embedder.embed("premium widget catalog");
        let unrelated = embedder.embed("weather forecast tomorrow");
        assert!(
            cosine_similarity(&keyword, &related) > cosine_similarity(&keyword, &unrelated)
        );
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashedBowEmbedder::default();
        let vector = embedder.embed("");
        assert!(vector.iter().all(|v| *v == 0.0));
        assert_eq!(cosine_similarity(&vector, &embedder.embed("widget")), 0.0);
    }
}
