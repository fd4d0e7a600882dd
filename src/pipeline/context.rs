//! The context mapping threaded between stages.
//!
//! Stage contracts (fields read → fields written):
//!
//! | stage | reads | writes |
//! |-------|-------|--------|
//! | retriever | `query` | `query`, `documents`, `top_k` |
//! | prompt | `query`, `documents`, text fields used by the template | `prompt` |
//! | llm | `prompt` | `output`, `yes_probs`, `no_probs` |
//! | `retriever_postprocess` | `documents`, `top_k` | `documents`, `top_k`, `selected` |
//! | `llm_postprocessor` | `output` | `generated_text`, `selected` |
//! | `pointwise_postprocessor` | `output`, `yes_probs`, `no_probs` | `generated_text`, `selected`, `yes_probs`, `no_probs` |
//! | `context_postprocessor` | `documents`, `query` | `context`, `query` |
//!
//! Each stage returns a fresh context; fields it does not write are dropped. Hence
//! `retriever_postprocess` and `context_postprocessor` must directly follow a retriever, which
//! [`Pipeline::new`](super::Pipeline::new) checks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::constants::DocumentId;

/// Well-known field names.
pub mod fields {
    pub const QUERY: &str = "query";
    pub const DOCUMENTS: &str = "documents";
    pub const TOP_K: &str = "top_k";
    pub const PROMPT: &str = "prompt";
    pub const OUTPUT: &str = "output";
    pub const YES_PROBS: &str = "yes_probs";
    pub const NO_PROBS: &str = "no_probs";
    pub const CONTEXT: &str = "context";
    pub const GENERATED_TEXT: &str = "generated_text";
    pub const SELECTED: &str = "selected";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Texts(Vec<String>),
    Ids(Vec<DocumentId>),
    /// Positions into the stage's candidate list.
    Positions(Vec<usize>),
    Probabilities(Vec<f32>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    fields: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context holding only `query`.
    pub fn with_query(query: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.insert(fields::QUERY, Value::Text(query.into()));
        ctx
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: Value) -> Option<Value> {
        self.fields.insert(name.to_string(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates `Text` fields (used as template variables).
    pub fn text_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|(name, value)| match value {
            Value::Text(text) => Some((name.as_str(), text.as_str())),
            _ => None,
        })
    }

    fn require(&self, stage: &str, name: &str) -> PipelineResult<&Value> {
        self.get(name).ok_or_else(|| PipelineError::MissingField {
            stage: stage.to_string(),
            field: name.to_string(),
        })
    }

    fn mismatch(stage: &str, name: &str, expected: &'static str) -> PipelineError {
        PipelineError::FieldType {
            stage: stage.to_string(),
            field: name.to_string(),
            expected,
        }
    }

    pub fn text(&self, stage: &str, name: &str) -> PipelineResult<&str> {
        match self.require(stage, name)? {
            Value::Text(text) => Ok(text),
            _ => Err(Self::mismatch(stage, name, "text")),
        }
    }

    pub fn texts(&self, stage: &str, name: &str) -> PipelineResult<&[String]> {
        match self.require(stage, name)? {
            Value::Texts(texts) => Ok(texts),
            _ => Err(Self::mismatch(stage, name, "a text list")),
        }
    }

    /// Reads a `Text` or `Texts` field as a list.
    pub fn text_or_texts(&self, stage: &str, name: &str) -> PipelineResult<Vec<&str>> {
        match self.require(stage, name)? {
            Value::Text(text) => Ok(vec![text.as_str()]),
            Value::Texts(texts) => Ok(texts.iter().map(String::as_str).collect()),
            _ => Err(Self::mismatch(stage, name, "text or a text list")),
        }
    }

    pub fn ids(&self, stage: &str, name: &str) -> PipelineResult<&[DocumentId]> {
        match self.require(stage, name)? {
            Value::Ids(ids) => Ok(ids),
            _ => Err(Self::mismatch(stage, name, "an id list")),
        }
    }

    pub fn positions(&self, stage: &str, name: &str) -> PipelineResult<&[usize]> {
        match self.require(stage, name)? {
            Value::Positions(positions) => Ok(positions),
            _ => Err(Self::mismatch(stage, name, "a position list")),
        }
    }

    pub fn probabilities(&self, stage: &str, name: &str) -> PipelineResult<&[f32]> {
        match self.require(stage, name)? {
            Value::Probabilities(probs) => Ok(probs),
            _ => Err(Self::mismatch(stage, name, "a probability list")),
        }
    }

    /// `documents` if present, otherwise an empty list.
    pub fn documents_or_empty(&self, stage: &str) -> PipelineResult<&[String]> {
        if self.contains(fields::DOCUMENTS) {
            self.texts(stage, fields::DOCUMENTS)
        } else {
            Ok(&[])
        }
    }

    pub fn query(&self, stage: &str) -> PipelineResult<&str> {
        self.text(stage, fields::QUERY)
    }

    pub fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }
}
