//! Generation-model seam and the inference stage.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::context::{Context, Value, fields};
use super::error::PipelineResult;
use crate::constants::ANSWER_SEPARATOR;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation model '{model}' failed: {reason}")]
    Failed { model: String, reason: String },

    #[error("generation model '{model}' is unavailable")]
    Unavailable { model: String },
}

/// One model answer plus the probabilities of the two designated answer tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub yes_prob: f32,
    pub no_prob: f32,
}

impl Generation {
    pub fn new(text: impl Into<String>, yes_prob: f32, no_prob: f32) -> Self {
        Self {
            text: text.into(),
            yes_prob,
            no_prob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub do_sample: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 128,
            do_sample: false,
        }
    }
}

/// Produces text and answer-token probabilities for a formatted prompt.
pub trait GenerationModel: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str, params: &GenerationParams)
    -> Result<Generation, GenerationError>;
}

/// Sends each prompt to the model in turn and joins the answers.
pub struct InferenceStage {
    model: Arc<dyn GenerationModel>,
    params: GenerationParams,
    system_prompt: Option<String>,
}

impl std::fmt::Debug for InferenceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceStage")
            .field("model", &self.model.name())
            .field("params", &self.params)
            .field("system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

impl InferenceStage {
    pub fn new(model: Arc<dyn GenerationModel>) -> Self {
        Self {
            model,
            params: GenerationParams::default(),
            system_prompt: None,
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Prepended to every prompt, separated by a blank line.
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub(crate) fn run(&self, ctx: Context) -> PipelineResult<Context> {
        let prompts = ctx.text_or_texts(self.name(), fields::PROMPT)?;

        let mut answers = Vec::with_capacity(prompts.len());
        let mut yes_probs = Vec::with_capacity(prompts.len());
        let mut no_probs = Vec::with_capacity(prompts.len());

        for prompt in prompts {
            let generation = match &self.system_prompt {
                Some(system) => self
                    .model
                    .generate(&format!("{}\n\n{}", system, prompt), &self.params)?,
                None => self.model.generate(prompt, &self.params)?,
            };
            answers.push(generation.text.trim().to_string());
            yes_probs.push(generation.yes_prob);
            no_probs.push(generation.no_prob);
        }

        debug!(model = %self.name(), prompts = answers.len(), "Generation complete");

        Ok(Context::new()
            .with(fields::OUTPUT, Value::Text(answers.join(ANSWER_SEPARATOR)))
            .with(fields::YES_PROBS, Value::Probabilities(yes_probs))
            .with(fields::NO_PROBS, Value::Probabilities(no_probs)))
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockGenerationModel;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use parking_lot::Mutex;

    use super::{Generation, GenerationError, GenerationModel, GenerationParams};

    type Responder = Box<dyn Fn(&str) -> Result<Generation, GenerationError> + Send + Sync>;

    /// Scripted model that records every prompt it receives.
    pub struct MockGenerationModel {
        name: String,
        responder: Responder,
        prompts: Mutex<Vec<String>>,
    }

    impl std::fmt::Debug for MockGenerationModel {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockGenerationModel")
                .field("name", &self.name)
                .field("calls", &self.prompts.lock().len())
                .finish()
        }
    }

    impl MockGenerationModel {
        /// Answers every prompt with `text`.
        pub fn fixed(text: impl Into<String>, yes_prob: f32, no_prob: f32) -> Self {
            let generation = Generation::new(text, yes_prob, no_prob);
            Self::from_fn(move |_| generation.clone())
        }

        pub fn from_fn<F>(f: F) -> Self
        where
            F: Fn(&str) -> Generation + Send + Sync + 'static,
        {
            Self {
                name: "mock".to_string(),
                responder: Box::new(move |prompt| Ok(f(prompt))),
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// Fails every call with [`GenerationError::Failed`].
        pub fn failing() -> Self {
            Self {
                name: "mock".to_string(),
                responder: Box::new(|_| {
                    Err(GenerationError::Failed {
                        model: "mock".to_string(),
                        reason: "scripted failure".to_string(),
                    })
                }),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn with_name(mut self, name: impl Into<String>) -> Self {
            self.name = name.into();
            self
        }

        /// Prompts received so far, in call order.
        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().clone()
        }
    }

    impl GenerationModel for MockGenerationModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn generate(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> Result<Generation, GenerationError> {
            self.prompts.lock().push(prompt.to_string());
            (self.responder)(prompt)
        }
    }
}
