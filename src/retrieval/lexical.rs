//! BM25 lexical retriever.
//!
//! The inverted index is built lazily on the first query and keyed by the bound knowledge base's
//! [`binding_id`](KnowledgeBase::binding_id). A query against any other binding rebuilds it,
//! so a cascade step never re-scores against a stale candidate set. Builds hold the index lock,
//! so concurrent queries on one binding build it once.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::normalize::{strip_diacritics, strip_punctuation, tokenize};
use super::{RankedDocuments, Retriever, RetrievalResult, rank_scored};
use crate::constants::{BM25_B, BM25_K1, EMPTY_QUERY_PLACEHOLDER};
use crate::knowledge_base::KnowledgeBase;

#[derive(Debug)]
struct Bm25Index {
    binding_id: u64,
    /// term -> (document position, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f32,
}

impl Bm25Index {
    fn build(kb: &KnowledgeBase, use_unidecode: bool) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(kb.len());

        for (position, doc) in kb.documents().iter().enumerate() {
            let text = if use_unidecode {
                strip_diacritics(&doc.text)
            } else {
                doc.text.clone()
            };
            let tokens = tokenize(&text);
            doc_lengths.push(tokens.len() as u32);

            let mut term_freq: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freq.entry(token).or_insert(0) += 1;
            }
            for (term, freq) in term_freq {
                postings.entry(term).or_default().push((position, freq));
            }
        }

        let total_length: u64 = doc_lengths.iter().map(|&l| l as u64).sum();
        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            total_length as f32 / doc_lengths.len() as f32
        };

        Self {
            binding_id: kb.binding_id(),
            postings,
            doc_lengths,
            avg_doc_length,
        }
    }

    fn idf(&self, doc_freq: usize) -> f32 {
        let n = self.doc_lengths.len() as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Scores every document containing at least one query term.
    fn score(&self, terms: &[String]) -> Vec<(usize, f32)> {
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(postings.len());

            for &(position, tf) in postings {
                let tf = tf as f32;
                let length_ratio = if self.avg_doc_length > 0.0 {
                    self.doc_lengths[position] as f32 / self.avg_doc_length
                } else {
                    0.0
                };
                let term_score = idf * (tf * (BM25_K1 + 1.0))
                    / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * length_ratio));
                *scores.entry(position).or_insert(0.0) += term_score;
            }
        }

        let mut scored: Vec<(usize, f32)> = scores.into_iter().collect();
        scored.sort_unstable_by_key(|&(position, _)| position);
        scored
    }
}

/// BM25 retriever over a [`KnowledgeBase`].
pub struct Bm25Retriever {
    name: String,
    top_k: Option<usize>,
    use_unidecode: bool,
    knowledge_base: KnowledgeBase,
    index: Mutex<Option<Arc<Bm25Index>>>,
    index_builds: AtomicUsize,
}

impl std::fmt::Debug for Bm25Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25Retriever")
            .field("name", &self.name)
            .field("top_k", &self.top_k)
            .field("use_unidecode", &self.use_unidecode)
            .field("knowledge_base", &self.knowledge_base)
            .finish()
    }
}

impl Bm25Retriever {
    pub fn new(knowledge_base: KnowledgeBase, top_k: Option<usize>) -> Self {
        Self {
            name: "bm25".to_string(),
            top_k,
            use_unidecode: true,
            knowledge_base,
            index: Mutex::new(None),
            index_builds: AtomicUsize::new(0),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Toggles diacritic stripping of documents and queries (default: on).
    pub fn with_unidecode(mut self, use_unidecode: bool) -> Self {
        self.use_unidecode = use_unidecode;
        self
    }

    /// Number of index builds so far.
    pub fn index_builds(&self) -> usize {
        self.index_builds.load(Ordering::Relaxed)
    }

    fn index_for(&self, kb: &KnowledgeBase) -> Arc<Bm25Index> {
        let mut guard = self.index.lock();

        if let Some(index) = guard.as_ref()
            && index.binding_id == kb.binding_id()
        {
            return index.clone();
        }

        let index = Arc::new(Bm25Index::build(kb, self.use_unidecode));
        self.index_builds.fetch_add(1, Ordering::Relaxed);
        info!(
            retriever = %self.name,
            knowledge_base = %kb.name(),
            documents = kb.len(),
            terms = index.postings.len(),
            "BM25 index built"
        );
        *guard = Some(index.clone());
        index
    }

    /// Normalizes a query into index terms.
    ///
    /// A query that is empty after normalization becomes the placeholder token, whose result
    /// is meaningless (usually empty) but never an error.
    fn query_terms(&self, query: &str) -> Vec<String> {
        let query = if self.use_unidecode {
            strip_diacritics(query)
        } else {
            query.to_string()
        };
        let mut query = strip_punctuation(&query);
        if query.is_empty() {
            query = EMPTY_QUERY_PLACEHOLDER.to_string();
        }
        tokenize(&query)
    }
}

impl Retriever for Bm25Retriever {
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
        let index = self.index_for(knowledge_base);
        let terms = self.query_terms(query);
        let scored = index.score(&terms);

        debug!(
            retriever = %self.name,
            terms = terms.len(),
            matched = scored.len(),
            "BM25 query scored"
        );

        Ok(RankedDocuments::from_positions(
            knowledge_base,
            rank_scored(scored, self.top_k),
        ))
    }
}
