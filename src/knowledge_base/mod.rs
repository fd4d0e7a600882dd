//! Addressable document collections used as retrieval candidate universes.
//!
//! A [`KnowledgeBase`] is immutable once built. Retrievers that need a different candidate
//! universe are handed a different knowledge base; each one carries a
//! [`binding_id`](KnowledgeBase::binding_id) fingerprint over its ids and texts, which is what
//! lexical indexes are keyed by.

pub mod error;


pub use error::{KnowledgeBaseError, KnowledgeBaseResult};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::DocumentId;
use crate::hashing::binding_fingerprint;

/// A single (identifier, text) pair, optionally tagged with a language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Document {
    pub fn new(id: DocumentId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

struct Inner {
    name: String,
    documents: Vec<Document>,
    positions: HashMap<DocumentId, usize>,
    binding_id: u64,
}

/// Cheaply clonable, immutable document collection.
#[derive(Clone)]
pub struct KnowledgeBase {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("name", &self.inner.name)
            .field("documents", &self.inner.documents.len())
            .field("binding_id", &format_args!("{:016x}", self.inner.binding_id))
            .finish()
    }
}

impl KnowledgeBase {
    /// Starts a builder for a named knowledge base.
    pub fn builder(name: impl Into<String>) -> KnowledgeBaseBuilder {
        KnowledgeBaseBuilder::new(name)
    }

    /// Builds a knowledge base from documents, keeping the first of any duplicate ids.
    pub fn new(name: impl Into<String>, documents: impl IntoIterator<Item = Document>) -> Self {
        Self::builder(name).documents(documents).build()
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, std::iter::empty())
    }

    /// Builds the derived knowledge base for a cascade step from a previous stage's output.
    pub fn from_retrieved(ids: &[DocumentId], texts: &[String]) -> KnowledgeBaseResult<Self> {
        if ids.len() != texts.len() {
            return Err(KnowledgeBaseError::LengthMismatch {
                ids: ids.len(),
                texts: texts.len(),
            });
        }

        let documents = ids
            .iter()
            .zip(texts.iter())
            .map(|(&id, text)| Document::new(id, text.clone()));

        Ok(Self::new(crate::constants::RETRIEVED_DOCUMENTS_KB, documents))
    }

    fn from_unique(name: String, documents: Vec<Document>) -> Self {
        let positions = documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| (doc.id, idx))
            .collect();
        let binding_id = binding_fingerprint(documents.iter().map(|d| (d.id, d.text.as_str())));

        Self {
            inner: Arc::new(Inner {
                name,
                documents,
                positions,
                binding_id,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn len(&self) -> usize {
        self.inner.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.documents.is_empty()
    }

    /// Documents in binding order (the order every score view is keyed to).
    pub fn documents(&self) -> &[Document] {
        &self.inner.documents
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.inner
            .positions
            .get(&id)
            .map(|&idx| &self.inner.documents[idx])
    }

    pub fn text(&self, id: DocumentId) -> Option<&str> {
        self.get(id).map(|doc| doc.text.as_str())
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.inner.positions.contains_key(&id)
    }

    /// Position of `id` in binding order.
    pub fn position(&self, id: DocumentId) -> Option<usize> {
        self.inner.positions.get(&id).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.inner.documents.iter().map(|doc| doc.id)
    }

    /// Fingerprint over ids and texts in binding order.
    pub fn binding_id(&self) -> u64 {
        self.inner.binding_id
    }
}

/// Collects documents and applies language/subset filters at construction.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseBuilder {
    name: String,
    documents: Vec<Document>,
    language: Option<String>,
    subset: Option<HashSet<DocumentId>>,
}

impl KnowledgeBaseBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Vec::new(),
            language: None,
            subset: None,
        }
    }

    pub fn document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn documents(mut self, documents: impl IntoIterator<Item = Document>) -> Self {
        self.documents.extend(documents);
        self
    }

    /// Keeps only documents tagged with `language` (untagged documents are dropped).
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Like [`language`](Self::language), but `None` clears the filter.
    pub fn language_filter(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Keeps only documents whose id is in `ids`.
    pub fn subset(mut self, ids: impl IntoIterator<Item = DocumentId>) -> Self {
        self.subset = Some(ids.into_iter().collect());
        self
    }

    pub fn build(self) -> KnowledgeBase {
        let total = self.documents.len();
        let mut seen = HashSet::with_capacity(total);
        let mut duplicates = 0usize;

        let documents: Vec<Document> = self
            .documents
            .into_iter()
            .filter(|doc| match &self.language {
                Some(lang) => doc.language.as_deref() == Some(lang.as_str()),
                None => true,
            })
            .filter(|doc| match &self.subset {
                Some(ids) => ids.contains(&doc.id),
                None => true,
            })
            .filter(|doc| {
                let fresh = seen.insert(doc.id);
                if !fresh {
                    duplicates += 1;
                }
                fresh
            })
            .collect();

        if duplicates > 0 {
            warn!(
                name = %self.name,
                duplicates,
                "Dropped documents with duplicate identifiers (first occurrence kept)"
            );
        }

        debug!(
            name = %self.name,
            total,
            kept = documents.len(),
            language = ?self.language,
            "Knowledge base built"
        );

        KnowledgeBase::from_unique(self.name, documents)
    }
}
