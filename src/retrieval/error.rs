use thiserror::Error;

use crate::embedding::EmbeddingError;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("invalid retriever configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
