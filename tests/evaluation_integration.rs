//! Integration tests for the evaluation sweep and differential comparison.

mod common;

use std::sync::Arc;

use claimrank::embedding::EmbeddingCache;
use claimrank::evaluation::{
    DifferentialConfig, EvaluationConfig, Percentage, QueryComparison, RankMap, advanced_metrics,
    compare_rows, evaluate, increase_in_order, load_rows, predicted_ranks, standard_metrics,
};
use claimrank::pipeline::PipelineConfig;
use claimrank::storage::DiskStore;
use common::fixtures::{CASCADE_PIPELINE, counting_embedder, dataset, registry_with};
use tempfile::TempDir;

/// Prediction with `id` at each given 1-based rank; other slots hold filler ids.
fn ranked(placements: &[(u64, usize)]) -> Vec<u64> {
    let len = placements.iter().map(|&(_, rank)| rank).max().unwrap_or(0);
    let mut predicted: Vec<u64> = (0..len as u64).map(|i| 50_000 + i).collect();
    for &(id, rank) in placements {
        predicted[rank - 1] = id;
    }
    predicted
}

#[test]
fn test_differential_reference_scenario() {
    let (x, y, z) = (7, 8, 9);
    let relevant = vec![x, y, z];
    let previous = ranked(&[(x, 50), (y, 1)]);
    let current = ranked(&[(x, 10), (y, 1)]);

    assert_eq!(
        predicted_ranks(&previous, &relevant, Some(100)),
        RankMap::from([(x, 50), (y, 1), (z, 100)])
    );
    assert_eq!(
        predicted_ranks(&current, &relevant, Some(100)),
        RankMap::from([(x, 10), (y, 1), (z, 100)])
    );

    let queries = [QueryComparison::new(relevant, previous, current)];
    let config = DifferentialConfig {
        not_found_rank: 100,
        top_k: 10,
    };
    let shift = increase_in_order(&queries, &config);

    assert_eq!(shift.increase_number, 1);
    assert_eq!(shift.increased_possible, 2);
    assert_eq!(shift.total_to_top_k, 1);
    assert_eq!(shift.removed_number, 0);

    let metrics = advanced_metrics(&queries, &config);
    assert_eq!(metrics.increased, 1);
    assert_eq!(metrics.increased_percentage, Percentage(Some(0.5)));
    assert_eq!(metrics.top_k_percentage, Percentage(Some(0.5)));
    assert_eq!(metrics.relevant_percentage, Percentage(Some(0.0)));
}

#[test]
fn test_mrr_monotonic_when_adding_perfect_query() {
    let mut batch = vec![
        RankMap::from([(1, 4)]),
        RankMap::from([(2, 100), (3, 12)]),
        RankMap::from([(4, 2)]),
    ];
    let before = standard_metrics(&batch).mrr.expect("defined");

    batch.push(RankMap::from([(5, 1)]));
    let after = standard_metrics(&batch).mrr.expect("defined");

    assert!(after >= before);
}

#[test]
fn test_sweep_cache_survives_restart_and_runs_compare() {
    let dir = TempDir::new().expect("temp dir");
    let cache_root = dir.path().join("embeddings");
    let dataset = dataset();
    let truth = dataset.ground_truth();
    let posts = dataset.posts_in(None);

    let lexical_rows = dir.path().join("bm25.jsonl");
    let cascade_rows = dir.path().join("cascade.jsonl");

    let lexical = registry_with(
        Arc::new(EmbeddingCache::in_memory(1_000)),
        counting_embedder(),
    )
    .build(
        &PipelineConfig::from_json(
            r#"{"steps": [{"retriever": {"name": "bm25", "top_k": 5, "use_unidecode": true,
                                         "knowledge_base": {"name": "multiclaim"}}}]}"#,
        )
        .expect("parse"),
    )
    .expect("build");
    let baseline = evaluate(
        &lexical,
        &posts,
        &truth,
        &EvaluationConfig {
            rows_path: Some(lexical_rows.clone()),
            ..Default::default()
        },
    )
    .expect("baseline sweep");
    assert_eq!(baseline.evaluated, posts.len());

    let cascade_config = PipelineConfig::from_json(CASCADE_PIPELINE).expect("parse");
    let first_embedder = counting_embedder();
    let first = registry_with(
        Arc::new(EmbeddingCache::with_disk(1_000, DiskStore::new(&cache_root))),
        first_embedder.clone(),
    )
    .build(&cascade_config)
    .expect("build");
    evaluate(&first, &posts, &truth, &EvaluationConfig::default()).expect("first sweep");
    let queries = posts.len();
    assert!(first_embedder.embedded_texts() > queries);

    // Fresh in-memory cache over the same directory: only queries need embedding.
    let second_embedder = counting_embedder();
    let second = registry_with(
        Arc::new(EmbeddingCache::with_disk(1_000, DiskStore::new(&cache_root))),
        second_embedder.clone(),
    )
    .build(&cascade_config)
    .expect("build");
    let current = evaluate(
        &second,
        &posts,
        &truth,
        &EvaluationConfig {
            rows_path: Some(cascade_rows.clone()),
            ..Default::default()
        },
    )
    .expect("second sweep");
    assert!(second_embedder.embedded_texts() <= queries);
    assert_eq!(current.evaluated, posts.len());

    let comparisons = compare_rows(
        &load_rows(&lexical_rows).expect("baseline rows"),
        &load_rows(&cascade_rows).expect("current rows"),
    );
    assert_eq!(comparisons.len(), posts.len());

    let differential = advanced_metrics(&comparisons, &DifferentialConfig::default());
    // The cascade only narrows the lexical candidates, so it can never surface new documents.
    assert_eq!(differential.to_top_k, 0);
    serde_json::to_string(&differential).expect("serialize");
}
