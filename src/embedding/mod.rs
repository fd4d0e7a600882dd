//! Embedding generation and the content-addressed embedding cache.
//!
//! - [`Embedder`] is the model seam (any `Send + Sync` implementation).
//! - [`StubEmbedder`] is a deterministic, model-free embedder.
//! - [`EmbeddingCache`] fronts an embedder with `moka` and an on-disk [`DiskStore`](crate::storage::DiskStore).

pub mod cache;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod stub;

#[cfg(test)]
mod tests;

pub use cache::EmbeddingCache;
pub use error::{EmbeddingError, EmbeddingResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::{CountingEmbedder, FailingEmbedder};
pub use stub::StubEmbedder;

use std::sync::Arc;

use half::f16;

/// Produces dense vectors for text.
pub trait Embedder: Send + Sync {
    /// Stable model identity; part of every cache key.
    fn model_id(&self) -> &str;

    /// Embeds a single text.
    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f16>>;

    /// Embeds a batch of texts, preserving order.
    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f16>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f16>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f16>>> {
        (**self).embed_batch(texts)
    }
}

#[inline]
pub fn f16_to_f32_vec(values: &[f16]) -> Vec<f32> {
    values.iter().map(|v| v.to_f32()).collect()
}

/// Cosine similarity; `0.0` for mismatched lengths or zero vectors.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a_sq, norm_b_sq) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (&av, &bv)| {
            (dot + av * bv, na + av * av, nb + bv * bv)
        });

    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
