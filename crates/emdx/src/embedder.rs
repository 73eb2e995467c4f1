//! Built-in offline embedding collaborator.
//!
//! Feature-hashing bag of words: no model downloads, deterministic, good
//! enough for local similarity over a personal knowledge base. Swappable
//! for a real model behind the same [`Embedder`] trait.

use sha2::{Digest, Sha256};

use emdx_search::Embedder;

/// Output dimensionality.
const DIMS: usize = 64;

/// Deterministic hashing embedder.
#[derive(Debug, Clone, Default)]
pub struct HashingEmbedder;

impl Embedder for HashingEmbedder {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, String> {
        let mut vector = vec![0.0f32; DIMS];
        for word in tokenize(text) {
            let hash = Sha256::digest(word.as_bytes());
            let index = (hash[0] as usize) % DIMS;
            // Second hash byte picks the sign so collisions can cancel
            // instead of compounding.
            let sign = if hash[1] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        "hashing-bow-64"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(|w| w.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdx_search::cosine_similarity;

    #[test]
    fn deterministic() {
        let e = HashingEmbedder;
        assert_eq!(
            e.embed_text("storage engine notes").unwrap(),
            e.embed_text("storage engine notes").unwrap()
        );
    }

    #[test]
    fn similar_texts_score_higher_than_unrelated() {
        let e = HashingEmbedder;
        let a = e.embed_text("database storage engine tuning").unwrap();
        let b = e.embed_text("storage engine database indexes").unwrap();
        let c = e.embed_text("sourdough bread hydration schedule").unwrap();

        let related = cosine_similarity(&a, &b);
        let unrelated = cosine_similarity(&a, &c);
        assert!(related > unrelated, "{related} <= {unrelated}");
    }

    #[test]
    fn vectors_are_normalized() {
        let e = HashingEmbedder;
        let v = e.embed_text("some words to embed").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder;
        let v = e.embed_text("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
