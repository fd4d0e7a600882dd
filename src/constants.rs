//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.

/// Identifier type shared by posts and fact-checked claims.
pub type DocumentId = u64;

/// Default `top_k` for a configured retriever step.
pub const DEFAULT_RETRIEVER_TOP_K: usize = 5;

/// Sentinel rank for a desired identifier missing from a prediction.
///
/// Conventionally larger than any rank a truncated prediction can produce.
pub const DEFAULT_NOT_FOUND_RANK: usize = 100;

/// Top-k threshold used by the differential analysis.
pub const DEFAULT_DIFF_TOP_K: usize = 10;

/// Predicted identifiers kept per row in row-level output.
pub const ROW_PREDICTION_LIMIT: usize = DEFAULT_NOT_FOUND_RANK;

/// Cut-offs reported as `success@k`.
pub const SUCCESS_AT_K: [usize; 6] = [1, 3, 5, 10, 20, 50];

/// BM25 term-frequency saturation.
pub const BM25_K1: f32 = 1.2;

/// BM25 document-length normalization.
pub const BM25_B: f32 = 0.75;

/// Token substituted for queries that normalize to nothing.
pub const EMPTY_QUERY_PLACEHOLDER: &str = "unk";

/// Dimension produced by the stub embedder.
pub const STUB_EMBEDDING_DIM: usize = 64;

/// Bytes per stored f16 component.
pub const F16_BYTES: usize = 2;

/// Default max entries in the in-memory embedding cache.
pub const DEFAULT_EMBEDDING_CACHE_CAPACITY: u64 = 100_000;

/// Separator placed between answers of a multi-prompt generation.
pub const ANSWER_SEPARATOR: &str = "##### ";

/// Knowledge-base name reserved for cascade-only retrievers.
pub const RETRIEVED_DOCUMENTS_KB: &str = "retrieved_documents";

/// Knowledge-base name under which the binary registers the fact-check corpus.
pub const FACT_CHECK_KB: &str = "multiclaim";

/// Seed for random few-shot selection when the pipeline definition sets none.
pub const DEFAULT_FEWSHOT_SEED: u64 = 42;
