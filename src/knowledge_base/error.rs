use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeBaseError {
    #[error("retrieved ids and texts differ in length: {ids} ids, {texts} texts")]
    LengthMismatch { ids: usize, texts: usize },

    #[error("knowledge base not registered: {name}")]
    NotRegistered { name: String },
}

pub type KnowledgeBaseResult<T> = Result<T, KnowledgeBaseError>;
