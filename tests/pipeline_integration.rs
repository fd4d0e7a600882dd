//! Integration tests for pipeline composition.

mod common;

use std::sync::Arc;

use claimrank::embedding::EmbeddingCache;
use claimrank::pipeline::{MockGenerationModel, PipelineConfig, PipelineError};
use common::fixtures::{CASCADE_PIPELINE, counting_embedder, fact_check_kb, registry_with};

#[test]
fn test_cascade_embeds_only_lexical_candidates() {
    let embedder = counting_embedder();
    let registry = registry_with(Arc::new(EmbeddingCache::in_memory(1_000)), embedder.clone());
    let pipeline = registry
        .build(&PipelineConfig::from_json(CASCADE_PIPELINE).expect("parse"))
        .expect("build");

    let output = pipeline.run("Do vaccines contain microchips?").expect("run");

    let selected = output.selected_ids();
    assert!(!selected.is_empty() && selected.len() <= 2);
    assert!(selected.contains(&102));
    // At most three candidate documents plus one query.
    assert!(embedder.embedded_texts() <= 4, "embedded {}", embedder.embedded_texts());
}

#[test]
fn test_cascade_short_circuits_on_no_lexical_match() {
    let embedder = counting_embedder();
    let registry = registry_with(Arc::new(EmbeddingCache::in_memory(1_000)), embedder.clone());
    let pipeline = registry
        .build(&PipelineConfig::from_json(CASCADE_PIPELINE).expect("parse"))
        .expect("build");

    let output = pipeline.run("zzzz qqqq").expect("run");

    assert!(output.selected_ids().is_empty());
    assert!(output.candidates.is_empty());
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn test_repeated_queries_reuse_document_vectors() {
    let embedder = counting_embedder();
    let registry = registry_with(Arc::new(EmbeddingCache::in_memory(1_000)), embedder.clone());
    let pipeline = registry
        .build(
            &PipelineConfig::from_json(
                r#"{"steps": [{"retriever": {"name": "embedding", "top_k": null,
                                            "knowledge_base": {"name": "multiclaim"}}}]}"#,
            )
            .expect("parse"),
        )
        .expect("build");

    let first = pipeline.run("bleach cure").expect("run");
    let after_first = embedder.embedded_texts();
    let second = pipeline.run("bleach cure").expect("run");

    assert_eq!(first, second);
    assert_eq!(first.selected_ids().len(), fact_check_kb().len());
    assert_eq!(after_first, fact_check_kb().len() + 1);
    assert_eq!(embedder.embedded_texts(), after_first + 1);
}

#[test]
fn test_aggregation_pipeline_selects_listed_candidates() {
    let registry = registry_with(
        Arc::new(EmbeddingCache::in_memory(1_000)),
        counting_embedder(),
    )
    .with_model(
        "mock",
        Arc::new(MockGenerationModel::fixed("0\n\nThe first claim matches.", 0.7, 0.3)),
    );
    let pipeline = registry
        .build(
            &PipelineConfig::from_json(
                r#"{"steps": [
                    {"retriever": {"name": "bm25", "top_k": 3, "knowledge_base": {"name": "multiclaim"}}},
                    {"prompt": {"type": "aggregation",
                                "template": "{document}\n\nPost: {query}\nMatching claims:"}},
                    {"llm": {"model": "mock", "system_prompt": "Answer with claim numbers."}},
                    {"postprocessor": {"name": "llm_postprocessor"}}
                ]}"#,
            )
            .expect("parse"),
        )
        .expect("build");

    let output = pipeline.run("bleach coronavirus").expect("run");

    assert_eq!(output.selected_ids(), vec![output.candidates.ids[0]]);
    assert_eq!(output.generated_text(), Some("0\n\nThe first claim matches."));
}

#[test]
fn test_invalid_definitions_fail_before_running() {
    let registry = registry_with(
        Arc::new(EmbeddingCache::in_memory(10)),
        counting_embedder(),
    );

    let orphan_cascade = PipelineConfig::from_json(
        r#"{"steps": [{"retriever": {"name": "bm25", "knowledge_base": {"name": "retrieved_documents"}}}]}"#,
    )
    .expect("parse");
    assert!(matches!(
        registry.build(&orphan_cascade),
        Err(PipelineError::Config { .. })
    ));

    let unknown_model = PipelineConfig::from_json(
        r#"{"steps": [{"prompt": {"type": "universal"}}, {"llm": {"model": "absent"}}]}"#,
    )
    .expect("parse");
    assert!(matches!(
        registry.build(&unknown_model),
        Err(PipelineError::UnknownModel { .. })
    ));
}
