//! Embedding-based retriever ranked by cosine similarity.

use std::sync::Arc;

use tracing::debug;

use super::{RankedDocuments, Retriever, RetrievalResult, rank_scored};
use crate::embedding::{Embedder, EmbeddingCache, cosine_similarity, f16_to_f32_vec};
use crate::knowledge_base::KnowledgeBase;

/// Dense retriever. Document vectors go through the shared [`EmbeddingCache`]; query vectors
/// are computed fresh on every call.
pub struct VectorRetriever {
    name: String,
    top_k: Option<usize>,
    knowledge_base: KnowledgeBase,
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
}

impl std::fmt::Debug for VectorRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRetriever")
            .field("name", &self.name)
            .field("top_k", &self.top_k)
            .field("model_id", &self.embedder.model_id())
            .field("knowledge_base", &self.knowledge_base)
            .finish()
    }
}

impl VectorRetriever {
    pub fn new(
        knowledge_base: KnowledgeBase,
        top_k: Option<usize>,
        embedder: Arc<dyn Embedder>,
        cache: Arc<EmbeddingCache>,
    ) -> Self {
        Self {
            name: "embedding".to_string(),
            top_k,
            knowledge_base,
            embedder,
            cache,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Similarity of `query` to every bound document, in knowledge-base order.
    pub fn similarities(&self, query: &str) -> RetrievalResult<Vec<f32>> {
        self.similarities_within(query, &self.knowledge_base)
    }

    /// Like [`similarities`](Self::similarities), against an explicit knowledge base.
    pub fn similarities_within(
        &self,
        query: &str,
        knowledge_base: &KnowledgeBase,
    ) -> RetrievalResult<Vec<f32>> {
        if knowledge_base.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = f16_to_f32_vec(&self.embedder.embed(query)?);

        let texts: Vec<&str> = knowledge_base
            .documents()
            .iter()
            .map(|doc| doc.text.as_str())
            .collect();
        let doc_vectors = self
            .cache
            .get_or_embed_many(self.embedder.as_ref(), &texts)?;

        Ok(doc_vectors
            .iter()
            .map(|doc| cosine_similarity(&query_vector, doc))
            .collect())
    }
}

impl Retriever for VectorRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn top_k(&self) -> Option<usize> {
        self.top_k
    }

    fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    fn retrieve_within(
        &self,
        query: &str,
        knowledge_base: &KnowledgeBase,
    ) -> RetrievalResult<RankedDocuments> {
        let scores = self.similarities_within(query, knowledge_base)?;

        debug!(
            retriever = %self.name,
            candidates = scores.len(),
            "Vector similarities computed"
        );

        let scored = scores.into_iter().enumerate().collect();
        Ok(RankedDocuments::from_positions(
            knowledge_base,
            rank_scored(scored, self.top_k),
        ))
    }
}
