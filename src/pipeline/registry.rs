//! Builds a [`Pipeline`] from a [`PipelineConfig`].
//!
//! Stage names resolve through fixed lookup tables. Every name in the definition (stages,
//! knowledge bases, models) is resolved before any stage is constructed, so a bad definition
//! fails before any query runs.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::config::{LlmStep, PipelineConfig, PostprocessorStep, PromptStep, RetrieverStep, StepConfig};
use super::error::{PipelineError, PipelineResult};
use super::inference::{GenerationModel, GenerationParams, InferenceStage};
use super::postprocess::Postprocessor;
use super::prompt::{FewShotSelector, PromptKind, PromptStage, default_examples};
use super::{Pipeline, Stage};
use crate::constants::RETRIEVED_DOCUMENTS_KB;
use crate::embedding::{Embedder, EmbeddingCache, StubEmbedder};
use crate::knowledge_base::KnowledgeBase;
use crate::retrieval::{Bm25Retriever, Retriever, VectorRetriever};

/// Resolves an embedding model name (`None` when the step names none) to an embedder.
pub type EmbedderFactory =
    Arc<dyn Fn(Option<&str>) -> PipelineResult<Arc<dyn Embedder>> + Send + Sync>;

type RetrieverBuilder =
    fn(&StageRegistry, &RetrieverStep, KnowledgeBase) -> PipelineResult<Box<dyn Retriever>>;

type PostprocessorBuilder = fn(&PostprocessorStep) -> PipelineResult<Postprocessor>;

const RETRIEVERS: &[(&str, RetrieverBuilder)] =
    &[("bm25", build_bm25), ("embedding", build_embedding)];

const PROMPTS: &[(&str, PromptKind)] = &[
    ("prompt", PromptKind::Template),
    ("pointwise", PromptKind::Pointwise),
    ("universal", PromptKind::Universal),
    ("aggregation", PromptKind::Aggregation),
    ("fewshot_pointwise", PromptKind::FewShotPointwise),
];

const POSTPROCESSORS: &[(&str, PostprocessorBuilder)] = &[
    ("retriever_postprocess", build_retriever_postprocess),
    ("llm_postprocessor", build_llm_postprocessor),
    ("pointwise_postprocessor", build_pointwise_postprocessor),
    ("context_postprocessor", build_context_postprocessor),
];

fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    table
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|(_, value)| *value)
}

fn build_bm25(
    _registry: &StageRegistry,
    step: &RetrieverStep,
    knowledge_base: KnowledgeBase,
) -> PipelineResult<Box<dyn Retriever>> {
    Ok(Box::new(
        Bm25Retriever::new(knowledge_base, step.top_k).with_unidecode(step.use_unidecode),
    ))
}

fn build_embedding(
    registry: &StageRegistry,
    step: &RetrieverStep,
    knowledge_base: KnowledgeBase,
) -> PipelineResult<Box<dyn Retriever>> {
    let embedder = (registry.embedder_factory)(step.model_name.as_deref())?;
    Ok(Box::new(VectorRetriever::new(
        knowledge_base,
        step.top_k,
        embedder,
        registry.cache.clone(),
    )))
}

fn build_retriever_postprocess(_step: &PostprocessorStep) -> PipelineResult<Postprocessor> {
    Ok(Postprocessor::retriever())
}

fn build_llm_postprocessor(_step: &PostprocessorStep) -> PipelineResult<Postprocessor> {
    Postprocessor::llm()
}

fn build_pointwise_postprocessor(_step: &PostprocessorStep) -> PipelineResult<Postprocessor> {
    Postprocessor::pointwise()
}

fn build_context_postprocessor(step: &PostprocessorStep) -> PipelineResult<Postprocessor> {
    Ok(Postprocessor::context(
        step.prefix_name.clone(),
        step.separator.clone(),
    ))
}

/// Named knowledge bases, generation models and embedders available to pipeline definitions.
pub struct StageRegistry {
    knowledge_bases: HashMap<String, KnowledgeBase>,
    models: HashMap<String, Arc<dyn GenerationModel>>,
    embedder_factory: EmbedderFactory,
    cache: Arc<EmbeddingCache>,
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("knowledge_bases", &self.knowledge_bases.keys().collect::<Vec<_>>())
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .finish()
    }
}

impl StageRegistry {
    /// A registry whose embedder factory returns a [`StubEmbedder`] for every model name.
    pub fn new(cache: Arc<EmbeddingCache>) -> Self {
        Self {
            knowledge_bases: HashMap::new(),
            models: HashMap::new(),
            embedder_factory: Arc::new(|_: Option<&str>| {
                Ok(Arc::new(StubEmbedder::new()) as Arc<dyn Embedder>)
            }),
            cache,
        }
    }

    pub fn with_knowledge_base(mut self, knowledge_base: KnowledgeBase) -> Self {
        self.register_knowledge_base(knowledge_base);
        self
    }

    pub fn register_knowledge_base(&mut self, knowledge_base: KnowledgeBase) {
        self.knowledge_bases
            .insert(knowledge_base.name().to_string(), knowledge_base);
    }

    pub fn with_model(mut self, name: impl Into<String>, model: Arc<dyn GenerationModel>) -> Self {
        self.models.insert(name.into(), model);
        self
    }

    pub fn with_embedder_factory(mut self, factory: EmbedderFactory) -> Self {
        self.embedder_factory = factory;
        self
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// Validates every name in `config`, then builds the pipeline.
    pub fn build(&self, config: &PipelineConfig) -> PipelineResult<Pipeline> {
        for step in &config.steps {
            self.resolve(step)?;
        }

        let stages = config
            .steps
            .iter()
            .map(|step| self.build_stage(step))
            .collect::<PipelineResult<Vec<_>>>()?;

        let pipeline = Pipeline::new(stages)?;
        info!(
            stages = pipeline.len(),
            names = ?pipeline.stages().iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            "Pipeline built"
        );
        Ok(pipeline)
    }

    fn resolve(&self, step: &StepConfig) -> PipelineResult<()> {
        match step {
            StepConfig::Retriever(step) => {
                lookup(RETRIEVERS, &step.name).ok_or_else(|| PipelineError::UnknownStage {
                    kind: "retriever",
                    name: step.name.clone(),
                })?;
                let name = &step.knowledge_base.name;
                if name != RETRIEVED_DOCUMENTS_KB && !self.knowledge_bases.contains_key(name) {
                    return Err(PipelineError::UnknownKnowledgeBase { name: name.clone() });
                }
            }
            StepConfig::Prompt(step) => {
                lookup(PROMPTS, &step.kind).ok_or_else(|| PipelineError::UnknownStage {
                    kind: "prompt",
                    name: step.kind.clone(),
                })?;
            }
            StepConfig::Llm(step) => {
                if !self.models.contains_key(&step.model) {
                    return Err(PipelineError::UnknownModel {
                        name: step.model.clone(),
                    });
                }
            }
            StepConfig::Postprocessor(step) => {
                lookup(POSTPROCESSORS, &step.name).ok_or_else(|| PipelineError::UnknownStage {
                    kind: "postprocessor",
                    name: step.name.clone(),
                })?;
            }
        }
        Ok(())
    }

    fn build_stage(&self, step: &StepConfig) -> PipelineResult<Stage> {
        match step {
            StepConfig::Retriever(step) => self.build_retriever(step).map(Stage::Retrieve),
            StepConfig::Prompt(step) => self.build_prompt(step).map(Stage::Prompt),
            StepConfig::Llm(step) => self.build_inference(step).map(Stage::Infer),
            StepConfig::Postprocessor(step) => {
                let builder =
                    lookup(POSTPROCESSORS, &step.name).ok_or_else(|| PipelineError::UnknownStage {
                        kind: "postprocessor",
                        name: step.name.clone(),
                    })?;
                builder(step).map(Stage::Postprocess)
            }
        }
    }

    fn knowledge_base_for(&self, step: &RetrieverStep) -> PipelineResult<KnowledgeBase> {
        let reference = &step.knowledge_base;
        if reference.name == RETRIEVED_DOCUMENTS_KB {
            return Ok(KnowledgeBase::empty(RETRIEVED_DOCUMENTS_KB));
        }

        let base = self
            .knowledge_bases
            .get(&reference.name)
            .ok_or_else(|| PipelineError::UnknownKnowledgeBase {
                name: reference.name.clone(),
            })?;

        if reference.language.is_none() && reference.subset.is_none() {
            return Ok(base.clone());
        }

        let mut builder = KnowledgeBase::builder(base.name())
            .documents(base.documents().iter().cloned())
            .language_filter(reference.language.clone());
        if let Some(subset) = &reference.subset {
            builder = builder.subset(subset.iter().copied());
        }
        Ok(builder.build())
    }

    fn build_retriever(&self, step: &RetrieverStep) -> PipelineResult<Box<dyn Retriever>> {
        let builder = lookup(RETRIEVERS, &step.name).ok_or_else(|| PipelineError::UnknownStage {
            kind: "retriever",
            name: step.name.clone(),
        })?;
        let knowledge_base = self.knowledge_base_for(step)?;
        builder(self, step, knowledge_base)
    }

    fn build_prompt(&self, step: &PromptStep) -> PipelineResult<PromptStage> {
        let kind = lookup(PROMPTS, &step.kind).ok_or_else(|| PipelineError::UnknownStage {
            kind: "prompt",
            name: step.kind.clone(),
        })?;

        let template = match (&step.template, kind) {
            (Some(template), _) => template.clone(),
            (None, PromptKind::Universal) => String::new(),
            (None, _) => {
                return Err(PipelineError::Config {
                    reason: format!("prompt '{}' requires a template", step.kind),
                });
            }
        };

        let stage = PromptStage::new(step.kind.clone(), kind, template);
        if kind != PromptKind::FewShotPointwise {
            return Ok(stage);
        }

        let selector = match step.strategy.as_deref() {
            None | Some("fixed") => {
                let mut examples = if step.examples.is_empty() {
                    default_examples()
                } else {
                    step.examples.clone()
                };
                examples.truncate(step.num_examples);
                FewShotSelector::Fixed(examples)
            }
            Some("random") => {
                let pool = if step.examples.is_empty() {
                    default_examples()
                } else {
                    step.examples.clone()
                };
                FewShotSelector::Random {
                    pool,
                    per_class: step.num_samples_per_class,
                    seed: step.seed,
                }
            }
            Some("cosine") => {
                if step.examples.is_empty() {
                    return Err(PipelineError::Config {
                        reason: "cosine few-shot selection requires an example pool".to_string(),
                    });
                }
                let embedder = (self.embedder_factory)(step.model_name.as_deref())?;
                let retriever = VectorRetriever::new(
                    KnowledgeBase::empty("fewshot"),
                    None,
                    embedder,
                    self.cache.clone(),
                );
                FewShotSelector::cosine(
                    step.examples.clone(),
                    step.num_samples_per_class,
                    Arc::new(retriever),
                )
            }
            Some(other) => {
                return Err(PipelineError::UnknownStage {
                    kind: "few-shot strategy",
                    name: other.to_string(),
                });
            }
        };

        Ok(stage.with_fewshot(selector))
    }

    fn build_inference(&self, step: &LlmStep) -> PipelineResult<InferenceStage> {
        let model = self
            .models
            .get(&step.model)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownModel {
                name: step.model.clone(),
            })?;

        Ok(InferenceStage::new(model)
            .with_params(GenerationParams {
                max_new_tokens: step.max_new_tokens,
                do_sample: step.do_sample,
            })
            .with_system_prompt(step.system_prompt.clone()))
    }
}
