use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("invalid embedder configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("embedder returned {actual} vectors for {expected} texts")]
    BatchSizeMismatch { expected: usize, actual: usize },

    #[error("embedding fill failed: {reason}")]
    FillFailed { reason: String },
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
