//! Labelled corpus: posts, fact-checked claims and their ground-truth pairs.
//!
//! ```json
//! {
//!   "posts": [{"id": 1, "text": "...", "language": "slk"}],
//!   "fact_checks": [{"id": 10, "text": "...", "language": "eng"}],
//!   "pairs": [{"fact_check_id": 10, "post_id": 1}]
//! }
//! ```

pub mod error;


pub use error::{DatasetError, DatasetResult};

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::DocumentId;
use crate::evaluation::GroundTruth;
use crate::knowledge_base::{Document, KnowledgeBase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactCheckPostPair {
    pub fact_check_id: DocumentId,
    pub post_id: DocumentId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub posts: Vec<Document>,
    pub fact_checks: Vec<Document>,
    #[serde(default)]
    pub pairs: Vec<FactCheckPostPair>,
}

impl Dataset {
    pub fn from_json(json: &str) -> DatasetResult<Self> {
        let dataset: Dataset = serde_json::from_str(json)?;
        dataset.warn_dangling_pairs();
        Ok(dataset)
    }

    pub fn load(path: &Path) -> DatasetResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            posts = dataset.posts.len(),
            fact_checks = dataset.fact_checks.len(),
            pairs = dataset.pairs.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Posts tagged with `language` (all posts when `None`).
    pub fn posts_in(&self, language: Option<&str>) -> Vec<Document> {
        self.posts
            .iter()
            .filter(|post| language.is_none() || post.language.as_deref() == language)
            .cloned()
            .collect()
    }

    /// Fact-checks as a knowledge base named `name`, optionally filtered by language.
    pub fn fact_check_knowledge_base(&self, name: &str, language: Option<&str>) -> KnowledgeBase {
        KnowledgeBase::builder(name)
            .documents(self.fact_checks.iter().cloned())
            .language_filter(language.map(str::to_string))
            .build()
    }

    pub fn ground_truth(&self) -> GroundTruth {
        GroundTruth::from_pairs(
            self.pairs
                .iter()
                .map(|pair| (pair.fact_check_id, pair.post_id)),
        )
    }

    fn warn_dangling_pairs(&self) {
        let posts: HashSet<DocumentId> = self.posts.iter().map(|doc| doc.id).collect();
        let fact_checks: HashSet<DocumentId> = self.fact_checks.iter().map(|doc| doc.id).collect();
        let dangling = self
            .pairs
            .iter()
            .filter(|pair| !posts.contains(&pair.post_id) || !fact_checks.contains(&pair.fact_check_id))
            .count();
        if dangling > 0 {
            warn!(dangling, "Pairs reference unknown posts or fact-checks");
        }
    }
}
