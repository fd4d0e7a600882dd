//! Test fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use claimrank::dataset::Dataset;
use claimrank::embedding::{CountingEmbedder, Embedder, EmbeddingCache, StubEmbedder};
use claimrank::knowledge_base::{Document, KnowledgeBase};
use claimrank::pipeline::{EmbedderFactory, StageRegistry};

pub const FACT_CHECK_KB: &str = claimrank::constants::FACT_CHECK_KB;

pub fn fact_checks() -> Vec<Document> {
    vec![
        Document::new(101, "5G towers do not spread the coronavirus").with_language("eng"),
        Document::new(102, "COVID-19 vaccines do not contain microchips").with_language("eng"),
        Document::new(103, "The moon landing footage was not staged").with_language("eng"),
        Document::new(104, "Vakcíny proti COVID-19 neobsahujú mikročipy").with_language("slk"),
        Document::new(105, "Drinking bleach does not cure the coronavirus").with_language("eng"),
        Document::new(106, "Bananas are not radioactive enough to harm you").with_language("eng"),
    ]
}

pub fn fact_check_kb() -> KnowledgeBase {
    KnowledgeBase::new(FACT_CHECK_KB, fact_checks())
}

pub fn posts() -> Vec<Document> {
    vec![
        Document::new(1, "The new 5G towers are spreading coronavirus!").with_language("eng"),
        Document::new(2, "They put microchips in the vaccines").with_language("eng"),
        Document::new(3, "Vakcíny obsahujú mikročipy").with_language("slk"),
        Document::new(4, "Drink bleach to cure the coronavirus").with_language("eng"),
    ]
}

pub fn dataset() -> Dataset {
    Dataset {
        posts: posts(),
        fact_checks: fact_checks(),
        pairs: [(101, 1), (102, 2), (104, 3), (102, 3), (105, 4)]
            .into_iter()
            .map(|(fact_check_id, post_id)| claimrank::dataset::FactCheckPostPair {
                fact_check_id,
                post_id,
            })
            .collect(),
    }
}

/// A registry with the fact-check corpus and an embedder factory that hands out `embedder`.
pub fn registry_with(
    cache: Arc<EmbeddingCache>,
    embedder: Arc<CountingEmbedder>,
) -> StageRegistry {
    let factory: EmbedderFactory = Arc::new(move |_: Option<&str>| Ok(embedder.clone() as Arc<dyn Embedder>));
    StageRegistry::new(cache)
        .with_knowledge_base(fact_check_kb())
        .with_embedder_factory(factory)
}

pub const CASCADE_PIPELINE: &str = r#"{"steps": [
    {"retriever": {"name": "bm25", "top_k": 3, "use_unidecode": true,
                   "knowledge_base": {"name": "multiclaim"}}},
    {"retriever": {"name": "embedding", "model_name": "stub", "top_k": 2,
                   "knowledge_base": {"name": "retrieved_documents"}}},
    {"postprocessor": {"name": "retriever_postprocess"}}
]}"#;

pub fn counting_embedder() -> Arc<CountingEmbedder> {
    Arc::new(CountingEmbedder::new(StubEmbedder::new()))
}
