//! claimrank evaluation entrypoint.

use std::sync::Arc;

use anyhow::Context as _;
use mimalloc::MiMalloc;

use claimrank::config::Config;
use claimrank::constants::FACT_CHECK_KB;
use claimrank::dataset::Dataset;
use claimrank::embedding::{Embedder, EmbeddingCache, StubEmbedder};
use claimrank::evaluation::{
    DifferentialConfig, EvaluationConfig, FailurePolicy, advanced_metrics, compare_rows, evaluate,
    load_rows,
};
use claimrank::pipeline::{EmbedderFactory, PipelineConfig, StageRegistry};
use claimrank::storage::DiskStore;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    let dataset = Dataset::load(config.require_dataset_path()?)?;
    let pipeline_config = PipelineConfig::load(config.require_pipeline_path()?)?;
    let language = config.language.as_deref();

    tracing::info!(
        language = language.unwrap_or("all"),
        cache_path = %config.cache_path.display(),
        steps = pipeline_config.steps.len(),
        "claimrank starting"
    );

    let disk = DiskStore::new(config.cache_path.clone());
    disk.ensure_root()?;
    let cache = Arc::new(EmbeddingCache::with_disk(config.cache_capacity, disk));

    let embedders: EmbedderFactory = Arc::new(|model_name: Option<&str>| {
        if let Some(name) = model_name {
            tracing::warn!(model = name, "No embedding backend for model, using stub embedder");
        }
        Ok(Arc::new(StubEmbedder::new()) as Arc<dyn Embedder>)
    });

    let registry = StageRegistry::new(cache)
        .with_knowledge_base(dataset.fact_check_knowledge_base(FACT_CHECK_KB, language))
        .with_embedder_factory(embedders);
    let pipeline = registry.build(&pipeline_config)?;

    let evaluation = EvaluationConfig {
        default_rank: config.default_rank,
        rows_path: config.rows_path.clone(),
        failure_policy: FailurePolicy::Abort,
    };
    let report = evaluate(
        &pipeline,
        &dataset.posts_in(language),
        &dataset.ground_truth(),
        &evaluation,
    )?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(baseline_path) = &config.baseline_rows_path {
        let rows_path = config
            .rows_path
            .as_ref()
            .context("CLAIMRANK_BASELINE_ROWS_PATH requires CLAIMRANK_ROWS_PATH")?;
        let comparisons = compare_rows(&load_rows(baseline_path)?, &load_rows(rows_path)?);
        let differential = advanced_metrics(
            &comparisons,
            &DifferentialConfig {
                top_k: config.diff_top_k,
                ..DifferentialConfig::default()
            },
        );
        tracing::info!(queries = comparisons.len(), "Differential comparison complete");
        println!("{}", serde_json::to_string_pretty(&differential)?);
    }

    Ok(())
}
