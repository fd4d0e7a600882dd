//! Retrievers: lexical (BM25) and dense (embedding) ranking over a [`KnowledgeBase`].
//!
//! Every retriever returns a [`RankedDocuments`] (most relevant first, truncated to `top_k`,
//! unbounded when `top_k` is `None`). Exact score ties keep knowledge-base order.

pub mod error;
pub mod lexical;
pub mod normalize;
pub mod vector;

#[cfg(test)]
mod tests;

pub use error::{RetrievalError, RetrievalResult};
pub use lexical::Bm25Retriever;
pub use vector::VectorRetriever;

use serde::{Deserialize, Serialize};

use crate::constants::DocumentId;
use crate::knowledge_base::KnowledgeBase;

/// Ordered retrieval output: identifiers and their texts, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedDocuments {
    pub ids: Vec<DocumentId>,
    pub texts: Vec<String>,
}

impl RankedDocuments {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolves knowledge-base positions into ids and texts.
    pub fn from_positions(knowledge_base: &KnowledgeBase, positions: Vec<usize>) -> Self {
        let documents = knowledge_base.documents();
        let (ids, texts) = positions
            .into_iter()
            .filter_map(|position| documents.get(position))
            .map(|doc| (doc.id, doc.text.clone()))
            .unzip();
        Self { ids, texts }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Orders `(position, score)` pairs and returns positions, best first.
///
/// `scored` must be in ascending position order; the stable sort then breaks exact ties by
/// knowledge-base order.
pub(crate) fn rank_scored(mut scored: Vec<(usize, f32)>, top_k: Option<usize>) -> Vec<usize> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut positions: Vec<usize> = scored.into_iter().map(|(position, _)| position).collect();
    if let Some(k) = top_k {
        positions.truncate(k);
    }
    positions
}

/// A ranking stage over a bound knowledge base.
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    /// Result cut-off; `None` returns every ranked candidate.
    fn top_k(&self) -> Option<usize>;

    /// The knowledge base this retriever is bound to.
    fn knowledge_base(&self) -> &KnowledgeBase;

    /// Ranks documents of `knowledge_base` (not necessarily the bound one) for `query`.
    fn retrieve_within(
        &self,
        query: &str,
        knowledge_base: &KnowledgeBase,
    ) -> RetrievalResult<RankedDocuments>;

    /// Ranks documents of the bound knowledge base for `query`.
    fn retrieve(&self, query: &str) -> RetrievalResult<RankedDocuments> {
        self.retrieve_within(query, self.knowledge_base())
    }
}
