//! Embedders for tests: call counting and forced failures.

use std::sync::atomic::{AtomicUsize, Ordering};

use half::f16;

use super::error::{EmbeddingError, EmbeddingResult};
use super::{Embedder, StubEmbedder};

/// Wraps an embedder and counts how many texts it was asked to embed.
#[derive(Debug, Default)]
pub struct CountingEmbedder<E = StubEmbedder> {
    inner: E,
    texts: AtomicUsize,
    calls: AtomicUsize,
}

impl<E: Embedder> CountingEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            texts: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Total texts embedded across all calls.
    pub fn embedded_texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    /// Number of `embed`/`embed_batch` invocations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<E: Embedder> Embedder for CountingEmbedder<E> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f16>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f16>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

/// Always fails with [`EmbeddingError::InferenceFailed`].
#[derive(Debug, Default, Clone)]
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn embed(&self, _text: &str) -> EmbeddingResult<Vec<f16>> {
        Err(EmbeddingError::InferenceFailed {
            reason: "mock embedder failure".to_string(),
        })
    }
}
