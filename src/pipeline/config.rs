//! Serialized pipeline definitions.
//!
//! ```json
//! {"steps": [
//!   {"retriever": {"name": "bm25", "top_k": 50, "knowledge_base": {"name": "multiclaim"}}},
//!   {"retriever": {"name": "embedding", "model_name": "intfloat/multilingual-e5-large",
//!                  "top_k": 5, "knowledge_base": {"name": "retrieved_documents"}}},
//!   {"postprocessor": {"name": "retriever_postprocess"}}
//! ]}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::PipelineResult;
use super::prompt::FewShotExample;
use crate::constants::{DEFAULT_FEWSHOT_SEED, DEFAULT_RETRIEVER_TOP_K, DocumentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepConfig {
    Retriever(RetrieverStep),
    Prompt(PromptStep),
    Llm(LlmStep),
    Postprocessor(PostprocessorStep),
}

fn default_top_k() -> Option<usize> {
    Some(DEFAULT_RETRIEVER_TOP_K)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieverStep {
    /// `bm25` or `embedding`.
    pub name: String,
    /// Embedding model identity (embedding retriever only).
    #[serde(default)]
    pub model_name: Option<String>,
    /// `null` returns every ranked candidate.
    #[serde(default = "default_top_k")]
    pub top_k: Option<usize>,
    /// Diacritic stripping (bm25 only).
    #[serde(default)]
    pub use_unidecode: bool,
    pub knowledge_base: KnowledgeBaseRef,
}

/// A registered knowledge base, optionally narrowed. The name `retrieved_documents` marks a
/// cascade step that only ever sees the previous retriever's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseRef {
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub subset: Option<Vec<DocumentId>>,
}

fn default_num_examples() -> usize {
    6
}

fn default_samples_per_class() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptStep {
    /// `prompt`, `pointwise`, `universal`, `aggregation` or `fewshot_pointwise`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub template: Option<String>,
    /// Few-shot selection: `fixed` (default), `random` or `cosine`.
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub examples: Vec<FewShotExample>,
    #[serde(default = "default_num_examples")]
    pub num_examples: usize,
    #[serde(default = "default_samples_per_class")]
    pub num_samples_per_class: usize,
    /// Seed for `random` selection.
    #[serde(default = "default_fewshot_seed")]
    pub seed: u64,
    /// Embedding model for `cosine` selection.
    #[serde(default)]
    pub model_name: Option<String>,
}

fn default_fewshot_seed() -> u64 {
    DEFAULT_FEWSHOT_SEED
}

fn default_max_new_tokens() -> usize {
    128
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmStep {
    /// Registered generation model name.
    pub model: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default)]
    pub do_sample: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_separator() -> String {
    " ".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostprocessorStep {
    pub name: String,
    #[serde(default)]
    pub prefix_name: Option<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}
