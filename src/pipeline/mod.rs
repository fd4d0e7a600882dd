//! Pipeline composition engine.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s threaded by a [`Context`]. Two adjacent
//! retrieval stages form a cascade: the second stage ranks only the documents the first one
//! returned (a derived [`KnowledgeBase`] built per query), with its input narrowed to the query.
//! If the first stage returned nothing, the second is skipped and the empty result stands.
//!
//! Stage errors propagate to the caller; no later stage runs.

pub mod config;
pub mod context;
pub mod error;
pub mod inference;
pub mod postprocess;
pub mod prompt;
pub mod registry;


pub use config::{
    KnowledgeBaseRef, LlmStep, PipelineConfig, PostprocessorStep, PromptStep, RetrieverStep,
    StepConfig,
};
pub use context::{Context, Value, fields};
pub use error::{PipelineError, PipelineResult};
#[cfg(any(test, feature = "mock"))]
pub use inference::MockGenerationModel;
pub use inference::{Generation, GenerationError, GenerationModel, GenerationParams, InferenceStage};
pub use postprocess::Postprocessor;
pub use prompt::{FewShotExample, FewShotSelector, PromptKind, PromptStage};
pub use registry::{EmbedderFactory, StageRegistry};

use tracing::{debug, instrument};

use crate::constants::{DocumentId, RETRIEVED_DOCUMENTS_KB};
use crate::knowledge_base::KnowledgeBase;
use crate::retrieval::{RankedDocuments, Retriever};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Retrieve,
    Prompt,
    Infer,
    Postprocess,
}

pub enum Stage {
    Retrieve(Box<dyn Retriever>),
    Prompt(PromptStage),
    Infer(InferenceStage),
    Postprocess(Postprocessor),
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Stage")
            .field(&self.kind())
            .field(&self.name())
            .finish()
    }
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Retrieve(_) => StageKind::Retrieve,
            Stage::Prompt(_) => StageKind::Prompt,
            Stage::Infer(_) => StageKind::Infer,
            Stage::Postprocess(_) => StageKind::Postprocess,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Stage::Retrieve(retriever) => retriever.name(),
            Stage::Prompt(prompt) => prompt.name(),
            Stage::Infer(inference) => inference.name(),
            Stage::Postprocess(postprocessor) => postprocessor.name(),
        }
    }
}

fn retrieval_context(query: String, ranked: &RankedDocuments) -> Context {
    Context::with_query(query)
        .with(fields::DOCUMENTS, Value::Texts(ranked.texts.clone()))
        .with(fields::TOP_K, Value::Ids(ranked.ids.clone()))
}

/// Final context plus the candidates of the last retrieval stage that ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    pub context: Context,
    pub candidates: RankedDocuments,
}

impl PipelineOutput {
    /// Identifiers the pipeline settled on, best first.
    ///
    /// `selected` positions are resolved against the candidates (positions out of range are
    /// dropped); without a selection, the context's `top_k` ids are used.
    pub fn selected_ids(&self) -> Vec<DocumentId> {
        if let Some(Value::Positions(positions)) = self.context.get(fields::SELECTED) {
            return positions
                .iter()
                .filter_map(|&position| self.candidates.ids.get(position).copied())
                .collect();
        }
        match self.context.get(fields::TOP_K) {
            Some(Value::Ids(ids)) => ids.clone(),
            _ => Vec::new(),
        }
    }

    pub fn generated_text(&self) -> Option<&str> {
        [fields::GENERATED_TEXT, fields::OUTPUT]
            .into_iter()
            .find_map(|name| match self.context.get(name) {
                Some(Value::Text(text)) => Some(text.as_str()),
                _ => None,
            })
    }

    pub fn yes_probs(&self) -> Option<&[f32]> {
        match self.context.get(fields::YES_PROBS) {
            Some(Value::Probabilities(probs)) => Some(probs),
            _ => None,
        }
    }

    pub fn no_probs(&self) -> Option<&[f32]> {
        match self.context.get(fields::NO_PROBS) {
            Some(Value::Probabilities(probs)) => Some(probs),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Validates stage ordering and builds the pipeline.
    pub fn new(stages: Vec<Stage>) -> PipelineResult<Self> {
        if stages.is_empty() {
            return Err(PipelineError::Config {
                reason: "pipeline has no stages".to_string(),
            });
        }

        let mut seen_prompt = false;
        let mut seen_inference = false;
        let mut previous: Option<StageKind> = None;
        for stage in &stages {
            match stage {
                Stage::Prompt(_) => seen_prompt = true,
                Stage::Infer(inference) => {
                    if !seen_prompt {
                        return Err(PipelineError::Config {
                            reason: format!(
                                "llm step '{}' has no preceding prompt step",
                                inference.name()
                            ),
                        });
                    }
                    seen_inference = true;
                }
                Stage::Postprocess(postprocessor) => {
                    if postprocessor.needs_generation() && !seen_inference {
                        return Err(PipelineError::Config {
                            reason: format!(
                                "postprocessor '{}' has no preceding llm step",
                                postprocessor.name()
                            ),
                        });
                    }
                    if postprocessor.needs_retrieval() && previous != Some(StageKind::Retrieve) {
                        return Err(PipelineError::Config {
                            reason: format!(
                                "postprocessor '{}' must directly follow a retriever",
                                postprocessor.name()
                            ),
                        });
                    }
                }
                Stage::Retrieve(retriever) => {
                    if retriever.knowledge_base().name() == RETRIEVED_DOCUMENTS_KB
                        && previous != Some(StageKind::Retrieve)
                    {
                        return Err(PipelineError::Config {
                            reason: format!(
                                "retriever '{}' uses '{}' but does not follow a retriever",
                                retriever.name(),
                                RETRIEVED_DOCUMENTS_KB
                            ),
                        });
                    }
                }
            }
            previous = Some(stage.kind());
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage for one query.
    #[instrument(skip(self, query), fields(query_len = query.len(), stages = self.stages.len()))]
    pub fn run(&self, query: &str) -> PipelineResult<PipelineOutput> {
        let mut ctx = Context::with_query(query);
        let mut candidates = RankedDocuments::empty();
        let mut previous: Option<StageKind> = None;

        for stage in &self.stages {
            ctx = match stage {
                Stage::Retrieve(retriever) if previous == Some(StageKind::Retrieve) => {
                    if candidates.is_empty() {
                        debug!(
                            stage = retriever.name(),
                            "Previous retriever returned nothing; skipping cascade step"
                        );
                        previous = Some(StageKind::Retrieve);
                        continue;
                    }
                    let derived = KnowledgeBase::from_retrieved(&candidates.ids, &candidates.texts)?;
                    let query = ctx.query(retriever.name())?.to_string();
                    let ranked = retriever.retrieve_within(&query, &derived)?;
                    debug!(
                        stage = retriever.name(),
                        candidates = derived.len(),
                        kept = ranked.len(),
                        "Cascade step re-ranked previous candidates"
                    );
                    let next = retrieval_context(query, &ranked);
                    candidates = ranked;
                    next
                }
                Stage::Retrieve(retriever) => {
                    let query = ctx.query(retriever.name())?.to_string();
                    let ranked = retriever.retrieve(&query)?;
                    let next = retrieval_context(query, &ranked);
                    candidates = ranked;
                    next
                }
                Stage::Prompt(prompt) => prompt.run(ctx)?,
                Stage::Infer(inference) => inference.run(ctx)?,
                Stage::Postprocess(postprocessor) => postprocessor.run(ctx)?,
            };
            previous = Some(stage.kind());
        }

        Ok(PipelineOutput {
            context: ctx,
            candidates,
        })
    }
}
