use super::*;
use std::sync::Arc;

use crate::embedding::{CountingEmbedder, EmbeddingCache, StubEmbedder};
use crate::knowledge_base::Document;

fn claims() -> KnowledgeBase {
    KnowledgeBase::new(
        "multiclaim",
        vec![
            Document::new(3, "5G towers spread the coronavirus"),
            Document::new(7, "Vaccines contain microchips for tracking"),
            Document::new(9, "The moon landing was staged in a studio"),
            Document::new(12, "Očkovanie obsahuje mikročipy"),
            Document::new(15, "Drinking bleach cures the coronavirus"),
        ],
    )
}

mod normalize_tests {
    use super::normalize::*;

    #[test]
    fn test_strip_diacritics() {
        assert_eq!(strip_diacritics("Očkovanie obsahuje mikročipy"), "Ockovanie obsahuje mikrocipy");
        assert_eq!(strip_diacritics("Ça été déjà vu"), "Ca ete deja vu");
        assert_eq!(strip_diacritics("plain"), "plain");
    }

    #[test]
    fn test_strip_punctuation() {
        assert_eq!(strip_punctuation("  Is it true?! "), "Is it true");
        assert_eq!(strip_punctuation("?!."), "");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("5G towers, SPREAD the virus!"),
            vec!["5g", "towers", "spread", "the", "virus"]
        );
        assert!(tokenize(" ... ").is_empty());
    }
}

mod rank_tests {
    use super::*;

    #[test]
    fn test_rank_scored_orders_descending() {
        let positions = rank_scored(vec![(0, 0.1), (1, 0.9), (2, 0.5)], None);
        assert_eq!(positions, vec![1, 2, 0]);
    }

    #[test]
    fn test_rank_scored_ties_keep_order() {
        let positions = rank_scored(vec![(0, 0.5), (1, 0.7), (2, 0.5), (3, 0.5)], None);
        assert_eq!(positions, vec![1, 0, 2, 3]);
    }

    #[test]
    fn test_rank_scored_truncates() {
        let positions = rank_scored(vec![(0, 0.1), (1, 0.9), (2, 0.5)], Some(2));
        assert_eq!(positions, vec![1, 2]);
        assert!(rank_scored(vec![(0, 1.0)], Some(0)).is_empty());
    }

    #[test]
    fn test_from_positions() {
        let ranked = RankedDocuments::from_positions(&claims(), vec![2, 0]);
        assert_eq!(ranked.ids, vec![9, 3]);
        assert_eq!(ranked.texts[1], "5G towers spread the coronavirus");
    }
}

mod bm25_tests {
    use super::*;

    #[test]
    fn test_ranks_matching_documents() {
        let retriever = Bm25Retriever::new(claims(), None);
        let result = retriever.retrieve("Do vaccines contain microchips?").expect("retrieve");

        assert_eq!(result.ids.first(), Some(&7));
        assert!(!result.ids.contains(&9));
        assert_eq!(result.ids.len(), result.texts.len());
    }

    #[test]
    fn test_top_k_truncation() {
        let retriever = Bm25Retriever::new(claims(), Some(1));
        let result = retriever.retrieve("coronavirus").expect("retrieve");
        assert_eq!(result.len(), 1);

        let unbounded = Bm25Retriever::new(claims(), None);
        assert_eq!(unbounded.retrieve("coronavirus").expect("retrieve").len(), 2);
    }

    #[test]
    fn test_unidecode_matches_across_diacritics() {
        let retriever = Bm25Retriever::new(claims(), None);
        let result = retriever.retrieve("ockovanie mikrocipy").expect("retrieve");
        assert_eq!(result.ids, vec![12]);

        let strict = Bm25Retriever::new(claims(), None).with_unidecode(false);
        assert!(strict.retrieve("ockovanie mikrocipy").expect("retrieve").is_empty());
    }

    #[test]
    fn test_degenerate_query_is_not_an_error() {
        let retriever = Bm25Retriever::new(claims(), None);
        let result = retriever.retrieve("?!...").expect("retrieve");
        assert!(result.is_empty());
        let result = retriever.retrieve("").expect("retrieve");
        assert!(result.is_empty());
    }

    #[test]
    fn test_idempotent_on_unchanged_binding() {
        let retriever = Bm25Retriever::new(claims(), None);
        let first = retriever.retrieve("the coronavirus towers").expect("first");
        let second = retriever.retrieve("the coronavirus towers").expect("second");

        assert_eq!(first, second);
        assert_eq!(retriever.index_builds(), 1);
    }

    #[test]
    fn test_rebuilds_for_new_binding() {
        let retriever = Bm25Retriever::new(claims(), None);
        retriever.retrieve("coronavirus").expect("full");

        let narrowed = KnowledgeBase::from_retrieved(
            &[15],
            &["Drinking bleach cures the coronavirus".to_string()],
        )
        .expect("derived");
        let result = retriever
            .retrieve_within("coronavirus", &narrowed)
            .expect("narrowed");

        assert_eq!(result.ids, vec![15]);
        assert_eq!(retriever.index_builds(), 2);

        let again = retriever.retrieve("coronavirus").expect("full again");
        assert_eq!(again.len(), 2);
        assert_eq!(retriever.index_builds(), 3);
    }

    #[test]
    fn test_empty_knowledge_base() {
        let retriever = Bm25Retriever::new(KnowledgeBase::empty("none"), None);
        assert!(retriever.retrieve("anything").expect("retrieve").is_empty());
    }

    #[test]
    fn test_ties_keep_knowledge_base_order() {
        let kb = KnowledgeBase::new(
            "ties",
            vec![
                Document::new(30, "alpha beta"),
                Document::new(10, "alpha gamma"),
                Document::new(20, "alpha delta"),
            ],
        );
        let retriever = Bm25Retriever::new(kb, None);
        assert_eq!(retriever.retrieve("alpha").expect("retrieve").ids, vec![30, 10, 20]);
    }
}

mod vector_tests {
    use super::*;

    fn retriever(top_k: Option<usize>) -> (VectorRetriever, Arc<CountingEmbedder>) {
        let embedder = Arc::new(CountingEmbedder::new(StubEmbedder::new()));
        let cache = Arc::new(EmbeddingCache::in_memory(1_000));
        (
            VectorRetriever::new(claims(), top_k, embedder.clone(), cache),
            embedder,
        )
    }

    #[test]
    fn test_exact_text_ranks_first() {
        let (retriever, _) = retriever(Some(3));
        let result = retriever
            .retrieve("The moon landing was staged in a studio")
            .expect("retrieve");

        assert_eq!(result.len(), 3);
        assert_eq!(result.ids[0], 9);
    }

    #[test]
    fn test_similarities_follow_knowledge_base_order() {
        let (retriever, _) = retriever(None);
        let scores = retriever
            .similarities("Vaccines contain microchips for tracking")
            .expect("scores");

        assert_eq!(scores.len(), 5);
        let best = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx);
        assert_eq!(best, Some(1));
    }

    #[test]
    fn test_documents_embedded_once_queries_every_time() {
        let (retriever, embedder) = retriever(None);

        retriever.retrieve("first query").expect("first");
        assert_eq!(embedder.embedded_texts(), 5 + 1);

        retriever.retrieve("first query").expect("second");
        assert_eq!(embedder.embedded_texts(), 5 + 2);
    }

    #[test]
    fn test_cache_shared_across_bindings() {
        let (retriever, embedder) = retriever(None);
        retriever.retrieve("warm").expect("warm");
        let before = embedder.embedded_texts();

        let narrowed = KnowledgeBase::builder("narrowed")
            .documents(claims().documents().to_vec())
            .subset([3, 9])
            .build();
        let result = retriever.retrieve_within("warm", &narrowed).expect("narrowed");

        assert_eq!(result.len(), 2);
        assert_eq!(embedder.embedded_texts(), before + 1);
    }

    #[test]
    fn test_empty_knowledge_base_skips_embedding() {
        let (retriever, embedder) = retriever(None);
        let result = retriever
            .retrieve_within("query", &KnowledgeBase::empty("none"))
            .expect("retrieve");

        assert!(result.is_empty());
        assert_eq!(embedder.embedded_texts(), 0);
    }

    #[test]
    fn test_embedding_failure_propagates() {
        let retriever = VectorRetriever::new(
            claims(),
            None,
            Arc::new(crate::embedding::FailingEmbedder),
            Arc::new(EmbeddingCache::in_memory(10)),
        );
        let err = retriever.retrieve("query").unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
    }
}
