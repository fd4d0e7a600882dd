//! claimrank library crate (used by the evaluation binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Corpus
//! - [`Document`], [`KnowledgeBase`] - Retrieval candidate universes
//! - [`Dataset`] - Posts, fact-checks and ground-truth pairs
//!
//! ## Retrieval
//! - [`Retriever`], [`Bm25Retriever`], [`VectorRetriever`] - Ranked document retrieval
//! - [`Embedder`], [`StubEmbedder`], [`EmbeddingCache`] - Dense vectors and their cache
//! - [`DiskStore`] - Persistent embedding records
//!
//! ## Pipelines
//! - [`Pipeline`], [`Stage`], [`Context`] - Stage chain with cascading retrieval
//! - [`PipelineConfig`], [`StageRegistry`] - Table-driven construction from JSON
//! - [`GenerationModel`] - Generation seam
//!
//! ## Evaluation
//! - [`predicted_ranks`], [`standard_metrics`] - Absolute scoring
//! - [`increase_in_order`], [`advanced_metrics`] - Differential comparison
//! - [`evaluate`] - Sweep over a labelled dataset
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod config;
pub mod constants;
pub mod dataset;
pub mod embedding;
pub mod evaluation;
pub mod hashing;
pub mod knowledge_base;
pub mod pipeline;
pub mod retrieval;
pub mod storage;

pub use config::{Config, ConfigError};
pub use constants::DocumentId;
pub use dataset::{Dataset, DatasetError, FactCheckPostPair};
#[cfg(any(test, feature = "mock"))]
pub use embedding::{CountingEmbedder, FailingEmbedder};
pub use embedding::{
    Embedder, EmbeddingCache, EmbeddingError, StubEmbedder, cosine_similarity, f16_to_f32_vec,
};
pub use evaluation::{
    DifferentialConfig, DifferentialMetrics, EvaluationConfig, EvaluationError, EvaluationReport,
    EvaluationRow, FailurePolicy, GroundTruth, OrderShift, Percentage, QueryComparison, RankMap,
    StandardMetrics, advanced_metrics, evaluate, increase_in_order, predicted_ranks,
    standard_metrics,
};
pub use hashing::{binding_fingerprint, embedding_key, hash_to_u64};
pub use knowledge_base::{Document, KnowledgeBase, KnowledgeBaseError};
#[cfg(any(test, feature = "mock"))]
pub use pipeline::MockGenerationModel;
pub use pipeline::{
    Context, Generation, GenerationError, GenerationModel, Pipeline, PipelineConfig,
    PipelineError, PipelineOutput, Stage, StageRegistry, Value,
};
pub use retrieval::{Bm25Retriever, RankedDocuments, RetrievalError, Retriever, VectorRetriever};
pub use storage::{DiskStore, StorageError};
