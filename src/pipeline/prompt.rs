//! Prompt construction stages and few-shot example selection.

use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::context::{Context, Value, fields};
use super::error::{PipelineError, PipelineResult};
use crate::hashing::hash_to_u64;
use crate::knowledge_base::{Document, KnowledgeBase};
use crate::retrieval::VectorRetriever;

/// Fills `{name}` placeholders from `vars`; `{{` and `}}` are literal braces.
pub fn render_template(template: &str, vars: &HashMap<&str, &str>) -> PipelineResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    return Err(PipelineError::Template {
                        placeholder: format!("{{{}", name),
                    });
                }
                let value = vars
                    .get(name.as_str())
                    .ok_or_else(|| PipelineError::Template {
                        placeholder: name.clone(),
                    })?;
                out.push_str(value);
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// A labelled (post, fact-check) pair shown to the model before the real question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub post: String,
    pub fact_check: String,
    pub relevant: bool,
}

impl FewShotExample {
    pub fn new(post: impl Into<String>, fact_check: impl Into<String>, relevant: bool) -> Self {
        Self {
            post: post.into(),
            fact_check: fact_check.into(),
            relevant,
        }
    }

    pub fn label(&self) -> &'static str {
        if self.relevant { "Yes" } else { "No" }
    }
}

/// Built-in multilingual examples, alternating positive and negative.
pub fn default_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample::new(
            "People die after being vaccinated against COVID-19.",
            "Deaths rose this year because of COVID-19; there is no link to the vaccines.",
            true,
        ),
        FewShotExample::new(
            "Soursop je zázračný prírodný zabijak rakovinových buniek.",
            "Kanabis môže mať protirakovinové vlastnosti, naznačuje nový výskum.",
            false,
        ),
        FewShotExample::new(
            "Ryanair-Flugzeugabsturz in Indien während der Landung im Jahr 2023.",
            "Im Jahr 2023 kam es zu einem Flugzeugabsturz der Ryanair-Fluggesellschaft.",
            true,
        ),
        FewShotExample::new(
            "Des parachutistes russes ont atterri à Kharkiv.",
            "Les tests PCR ne sont pas fiables et mettent la santé en danger.",
            false,
        ),
    ]
}

/// How few-shot examples are chosen for each (post, fact-check) pair.
pub enum FewShotSelector {
    /// The same examples for every pair.
    Fixed(Vec<FewShotExample>),
    /// `per_class` positives and negatives drawn at random from the pool, interleaved.
    ///
    /// The draw is seeded from `seed` and the pair itself, so a pair always sees the same
    /// examples regardless of evaluation order.
    Random {
        pool: Vec<FewShotExample>,
        per_class: usize,
        seed: u64,
    },
    /// The pool examples most similar to the pair: post similarity multiplied by fact-check
    /// similarity, best first, `per_class` positives and negatives interleaved.
    Cosine {
        pool: Vec<FewShotExample>,
        per_class: usize,
        retriever: Arc<VectorRetriever>,
        posts: KnowledgeBase,
        fact_checks: KnowledgeBase,
    },
}

impl std::fmt::Debug for FewShotSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FewShotSelector::Fixed(examples) => {
                f.debug_tuple("Fixed").field(&examples.len()).finish()
            }
            FewShotSelector::Random {
                pool,
                per_class,
                seed,
            } => f
                .debug_struct("Random")
                .field("pool", &pool.len())
                .field("per_class", per_class)
                .field("seed", seed)
                .finish(),
            FewShotSelector::Cosine {
                pool, per_class, ..
            } => f
                .debug_struct("Cosine")
                .field("pool", &pool.len())
                .field("per_class", per_class)
                .finish(),
        }
    }
}

impl FewShotSelector {
    pub fn cosine(pool: Vec<FewShotExample>, per_class: usize, retriever: Arc<VectorRetriever>) -> Self {
        let posts = KnowledgeBase::new(
            "fewshot_posts",
            pool.iter()
                .enumerate()
                .map(|(idx, ex)| Document::new(idx as u64, ex.post.clone())),
        );
        let fact_checks = KnowledgeBase::new(
            "fewshot_fact_checks",
            pool.iter()
                .enumerate()
                .map(|(idx, ex)| Document::new(idx as u64, ex.fact_check.clone())),
        );
        Self::Cosine {
            pool,
            per_class,
            retriever,
            posts,
            fact_checks,
        }
    }

    pub fn select(&self, post: &str, fact_check: &str) -> PipelineResult<Vec<FewShotExample>> {
        match self {
            FewShotSelector::Fixed(examples) => Ok(examples.clone()),
            FewShotSelector::Random {
                pool,
                per_class,
                seed,
            } => {
                let pair_key = format!("{}\u{0}{}", post, fact_check);
                let mut rng = StdRng::seed_from_u64(seed ^ hash_to_u64(pair_key.as_bytes()));

                let (positives, negatives): (Vec<&FewShotExample>, Vec<&FewShotExample>) =
                    pool.iter().partition(|example| example.relevant);
                let positives: Vec<FewShotExample> = positives
                    .choose_multiple(&mut rng, *per_class)
                    .map(|example| (*example).clone())
                    .collect();
                let negatives: Vec<FewShotExample> = negatives
                    .choose_multiple(&mut rng, *per_class)
                    .map(|example| (*example).clone())
                    .collect();

                Ok(interleave(positives, negatives))
            }
            FewShotSelector::Cosine {
                pool,
                per_class,
                retriever,
                posts,
                fact_checks,
            } => {
                let post_sims = retriever.similarities_within(post, posts)?;
                let fact_check_sims = retriever.similarities_within(fact_check, fact_checks)?;

                let mut order: Vec<(usize, f32)> = post_sims
                    .iter()
                    .zip(fact_check_sims.iter())
                    .map(|(p, f)| p * f)
                    .enumerate()
                    .collect();
                order.sort_by(|a, b| b.1.total_cmp(&a.1));

                let mut positives = Vec::with_capacity(*per_class);
                let mut negatives = Vec::with_capacity(*per_class);
                for (idx, _) in order {
                    let example = &pool[idx];
                    if example.relevant && positives.len() < *per_class {
                        positives.push(example.clone());
                    } else if !example.relevant && negatives.len() < *per_class {
                        negatives.push(example.clone());
                    }
                    if positives.len() == *per_class && negatives.len() == *per_class {
                        break;
                    }
                }

                Ok(interleave(positives, negatives))
            }
        }
    }
}

/// Positive, negative, positive, ... stopping at the shorter list.
fn interleave(positives: Vec<FewShotExample>, negatives: Vec<FewShotExample>) -> Vec<FewShotExample> {
    positives
        .into_iter()
        .zip(negatives)
        .flat_map(|(p, n)| [p, n])
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// One prompt from the template over the context's text fields.
    Template,
    /// One prompt per candidate document.
    Pointwise,
    /// Documents joined by spaces, a blank line, then the query. No template.
    Universal,
    /// One prompt listing the candidates as `Fact-checked claim {i}: ...` (0-based).
    Aggregation,
    /// Pointwise prompts preceded by answered few-shot examples.
    FewShotPointwise,
}

#[derive(Debug)]
pub struct PromptStage {
    name: String,
    kind: PromptKind,
    template: String,
    fewshot: Option<FewShotSelector>,
}

impl PromptStage {
    pub fn new(name: impl Into<String>, kind: PromptKind, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            template: template.into(),
            fewshot: None,
        }
    }

    pub fn with_fewshot(mut self, selector: FewShotSelector) -> Self {
        self.fewshot = Some(selector);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    fn render_pair(&self, query: &str, document: &str) -> PipelineResult<String> {
        let vars = HashMap::from([(fields::QUERY, query), ("document", document)]);
        render_template(&self.template, &vars)
    }

    fn fewshot_prompt(&self, query: &str, document: &str) -> PipelineResult<String> {
        let examples = match &self.fewshot {
            Some(selector) => selector.select(query, document)?,
            None => default_examples(),
        };

        let mut shots = Vec::with_capacity(examples.len());
        for example in &examples {
            let rendered = self.render_pair(&example.post, &example.fact_check)?;
            shots.push(format!("{}{}", rendered, example.label()));
        }

        Ok(format!(
            "{}\n\n{}",
            shots.join("\n\n"),
            self.render_pair(query, document)?
        ))
    }

    pub(crate) fn run(&self, ctx: Context) -> PipelineResult<Context> {
        let query = ctx.query(&self.name)?;
        let documents = ctx.documents_or_empty(&self.name)?;

        let prompt = match self.kind {
            PromptKind::Template => {
                let vars: HashMap<&str, &str> = ctx.text_fields().collect();
                Value::Text(render_template(&self.template, &vars)?)
            }
            PromptKind::Pointwise => Value::Texts(
                documents
                    .iter()
                    .map(|doc| self.render_pair(query, doc))
                    .collect::<PipelineResult<_>>()?,
            ),
            PromptKind::Universal => Value::Text(format!("{}\n\n{}", documents.join(" "), query)),
            PromptKind::Aggregation => {
                let listed = documents
                    .iter()
                    .enumerate()
                    .map(|(idx, doc)| format!("Fact-checked claim {}: {}", idx, doc))
                    .collect::<Vec<_>>()
                    .join("\n");
                Value::Text(self.render_pair(query, &listed)?)
            }
            PromptKind::FewShotPointwise => Value::Texts(
                documents
                    .iter()
                    .map(|doc| self.fewshot_prompt(query, doc))
                    .collect::<PipelineResult<_>>()?,
            ),
        };

        debug!(stage = %self.name, kind = ?self.kind, "Prompt built");

        Ok(Context::new().with(fields::PROMPT, prompt))
    }
}
