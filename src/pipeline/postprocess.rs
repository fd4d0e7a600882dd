//! Postprocessing stages.
//!
//! Generated text is untrusted: anything that cannot be parsed yields an empty selection
//! instead of an error.

use regex::Regex;
use tracing::{debug, warn};

use super::context::{Context, Value, fields};
use super::error::PipelineResult;
use crate::constants::ANSWER_SEPARATOR;

#[derive(Debug)]
pub enum Postprocessor {
    /// Every retrieved candidate is selected, in retrieval order.
    Retriever,
    /// Candidate positions listed in the first paragraph of the answer.
    Llm { numbers: Regex },
    /// Positions whose own answer is "Yes".
    Pointwise { answers: Regex },
    /// Documents joined into a `context` field for a later prompt.
    Context {
        prefix_name: Option<String>,
        separator: String,
    },
}

impl Postprocessor {
    pub fn retriever() -> Self {
        Postprocessor::Retriever
    }

    pub fn llm() -> PipelineResult<Self> {
        Ok(Postprocessor::Llm {
            numbers: Regex::new(r"\d+")?,
        })
    }

    pub fn pointwise() -> PipelineResult<Self> {
        Ok(Postprocessor::Pointwise {
            answers: Regex::new(r"(?i)\b(yes|no)\b")?,
        })
    }

    pub fn context(prefix_name: Option<String>, separator: impl Into<String>) -> Self {
        Postprocessor::Context {
            prefix_name,
            separator: separator.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Postprocessor::Retriever => "retriever_postprocess",
            Postprocessor::Llm { .. } => "llm_postprocessor",
            Postprocessor::Pointwise { .. } => "pointwise_postprocessor",
            Postprocessor::Context { .. } => "context_postprocessor",
        }
    }

    /// Whether this postprocessor reads the documents of the stage right before it.
    pub fn needs_retrieval(&self) -> bool {
        matches!(
            self,
            Postprocessor::Retriever | Postprocessor::Context { .. }
        )
    }

    /// Whether this postprocessor consumes generation output.
    pub fn needs_generation(&self) -> bool {
        matches!(
            self,
            Postprocessor::Llm { .. } | Postprocessor::Pointwise { .. }
        )
    }

    pub(crate) fn run(&self, ctx: Context) -> PipelineResult<Context> {
        match self {
            Postprocessor::Retriever => {
                let documents = ctx.texts(self.name(), fields::DOCUMENTS)?.to_vec();
                let ids = ctx.ids(self.name(), fields::TOP_K)?.to_vec();
                let selected = (0..ids.len()).collect();
                Ok(Context::new()
                    .with(fields::DOCUMENTS, Value::Texts(documents))
                    .with(fields::TOP_K, Value::Ids(ids))
                    .with(fields::SELECTED, Value::Positions(selected)))
            }
            Postprocessor::Llm { numbers } => {
                let output = self.generated_output(&ctx);
                let selected = output
                    .as_deref()
                    .map(|text| parse_listed_positions(numbers, text))
                    .unwrap_or_default();
                debug!(selected = selected.len(), "Parsed listed candidates");
                Ok(Context::new()
                    .with(fields::GENERATED_TEXT, Value::Text(output.unwrap_or_default()))
                    .with(fields::SELECTED, Value::Positions(selected)))
            }
            Postprocessor::Pointwise { answers } => {
                let output = self.generated_output(&ctx);
                let selected = output
                    .as_deref()
                    .map(|text| parse_yes_positions(answers, text))
                    .unwrap_or_default();
                let yes_probs = ctx
                    .probabilities(self.name(), fields::YES_PROBS)
                    .map(<[f32]>::to_vec)
                    .unwrap_or_default();
                let no_probs = ctx
                    .probabilities(self.name(), fields::NO_PROBS)
                    .map(<[f32]>::to_vec)
                    .unwrap_or_default();
                debug!(selected = selected.len(), "Parsed pointwise answers");
                Ok(Context::new()
                    .with(fields::GENERATED_TEXT, Value::Text(output.unwrap_or_default()))
                    .with(fields::SELECTED, Value::Positions(selected))
                    .with(fields::YES_PROBS, Value::Probabilities(yes_probs))
                    .with(fields::NO_PROBS, Value::Probabilities(no_probs)))
            }
            Postprocessor::Context {
                prefix_name,
                separator,
            } => {
                let query = ctx.query(self.name())?.to_string();
                let documents = ctx.texts(self.name(), fields::DOCUMENTS)?;
                let context = match prefix_name {
                    Some(prefix) => documents
                        .iter()
                        .enumerate()
                        .map(|(idx, doc)| format!("{} {}: {}", prefix, idx + 1, doc))
                        .collect::<Vec<_>>()
                        .join(separator),
                    None => documents.join(separator),
                };
                Ok(Context::new()
                    .with(fields::CONTEXT, Value::Text(context))
                    .with(fields::QUERY, Value::Text(query)))
            }
        }
    }

    fn generated_output(&self, ctx: &Context) -> Option<String> {
        match ctx.text(self.name(), fields::OUTPUT) {
            Ok(text) => Some(text.to_string()),
            Err(e) => {
                warn!(stage = self.name(), error = %e, "No usable generation output");
                None
            }
        }
    }
}

/// Numbers in the first paragraph, in order. Numbers too large for `usize` are skipped.
pub fn parse_listed_positions(numbers: &Regex, output: &str) -> Vec<usize> {
    let first_paragraph = output.split("\n\n").next().unwrap_or_default();
    numbers
        .find_iter(first_paragraph)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Positions of the per-prompt answers whose first Yes/No word is "Yes".
///
/// Answers are separated by [`ANSWER_SEPARATOR`]; answer `i` belongs to candidate `i`. An
/// answer without a Yes/No word selects nothing and does not shift the others.
pub fn parse_yes_positions(answers: &Regex, output: &str) -> Vec<usize> {
    output
        .split(ANSWER_SEPARATOR)
        .enumerate()
        .filter(|(_, answer)| {
            answers
                .captures(answer)
                .and_then(|caps| caps.get(1))
                .is_some_and(|m| m.as_str().eq_ignore_ascii_case("yes"))
        })
        .map(|(idx, _)| idx)
        .collect()
}
