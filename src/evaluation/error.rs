use std::path::PathBuf;

use thiserror::Error;

use crate::constants::DocumentId;
use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("pipeline failed for post {post_id}: {source}")]
    Pipeline {
        post_id: DocumentId,
        #[source]
        source: PipelineError,
    },

    #[error("failed to access rows at {path}: {source}")]
    RowsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row at {path}:{line}: {source}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize row: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid evaluation config: {reason}")]
    InvalidConfig { reason: String },
}

pub type EvaluationResult<T> = Result<T, EvaluationError>;
