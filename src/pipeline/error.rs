use thiserror::Error;

use crate::knowledge_base::KnowledgeBaseError;
use crate::pipeline::inference::GenerationError;
use crate::retrieval::RetrievalError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {reason}")]
    Config { reason: String },

    #[error("unknown {kind} '{name}'")]
    UnknownStage { kind: &'static str, name: String },

    #[error("unknown knowledge base '{name}'")]
    UnknownKnowledgeBase { name: String },

    #[error("unknown generation model '{name}'")]
    UnknownModel { name: String },

    #[error("stage '{stage}' requires context field '{field}'")]
    MissingField { stage: String, field: String },

    #[error("stage '{stage}': context field '{field}' is not {expected}")]
    FieldType {
        stage: String,
        field: String,
        expected: &'static str,
    },

    #[error("template placeholder '{placeholder}' has no value")]
    Template { placeholder: String },

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    KnowledgeBase(#[from] KnowledgeBaseError),

    #[error("failed to parse pipeline definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
