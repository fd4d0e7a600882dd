use half::f16;
use tracing::debug;

use super::error::{EmbeddingError, EmbeddingResult};
use super::Embedder;
use crate::constants::STUB_EMBEDDING_DIM;
use crate::hashing::hash_to_u64;

/// Deterministic hashed bag-of-tokens embedder.
///
/// Each lowercased alphanumeric token seeds a pseudo-random unit direction; a text embeds to the
/// normalized sum of its token directions. Texts sharing tokens therefore score higher under
/// cosine similarity, which is enough for wiring and tests without model files.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    model_id: String,
    embedding_dim: usize,
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self {
            model_id: format!("stub-bow-{}", STUB_EMBEDDING_DIM),
            embedding_dim: STUB_EMBEDDING_DIM,
        }
    }
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dim(embedding_dim: usize) -> EmbeddingResult<Self> {
        if embedding_dim == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "embedding_dim must be positive".to_string(),
            });
        }
        Ok(Self {
            model_id: format!("stub-bow-{}", embedding_dim),
            embedding_dim,
        })
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn accumulate_token(&self, token: &str, acc: &mut [f32]) {
        let mut state = hash_to_u64(token.as_bytes());
        for slot in acc.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot += ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        }
    }

    fn normalize_and_convert_f16(mut embedding: Vec<f32>) -> Vec<f16> {
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        embedding.into_iter().map(f16::from_f32).collect()
    }
}

impl Embedder for StubEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f16>> {
        let mut embedding = vec![0.0f32; self.embedding_dim];
        let mut tokens = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            self.accumulate_token(&token.to_lowercase(), &mut embedding);
            tokens += 1;
        }

        debug!(text_len = text.len(), tokens, "Generating stub embedding");

        Ok(Self::normalize_and_convert_f16(embedding))
    }
}
