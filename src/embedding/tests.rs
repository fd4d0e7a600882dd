use super::*;
use crate::storage::DiskStore;
use tempfile::TempDir;

mod stub_tests {
    use super::*;

    #[test]
    fn test_stub_is_deterministic() {
        let embedder = StubEmbedder::new();
        let a = embedder.embed("Vaccines contain microchips").expect("embed");
        let b = embedder.embed("Vaccines contain microchips").expect("embed");
        assert_eq!(a, b);
        assert_eq!(a.len(), embedder.embedding_dim());
    }

    #[test]
    fn test_stub_is_normalized() {
        let embedder = StubEmbedder::new();
        let v = f16_to_f32_vec(&embedder.embed("the moon landing was staged").expect("embed"));
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "norm was {}", norm);
    }

    #[test]
    fn test_stub_empty_text_is_zero_vector() {
        let embedder = StubEmbedder::new();
        let v = embedder.embed("  ?! ").expect("embed");
        assert!(v.iter().all(|x| x.to_f32() == 0.0));
    }

    #[test]
    fn test_stub_token_overlap_scores_higher() {
        let embedder = StubEmbedder::new();
        let query = f16_to_f32_vec(&embedder.embed("5G towers spread the virus").expect("q"));
        let close = f16_to_f32_vec(&embedder.embed("Do 5G towers spread the virus?").expect("a"));
        let far = f16_to_f32_vec(&embedder.embed("Bananas are radioactive").expect("b"));

        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_stub_case_insensitive() {
        let embedder = StubEmbedder::new();
        assert_eq!(
            embedder.embed("Moon Landing").expect("a"),
            embedder.embed("moon landing").expect("b")
        );
    }

    #[test]
    fn test_stub_with_dim() {
        let embedder = StubEmbedder::with_dim(8).expect("valid");
        assert_eq!(embedder.embed("x").expect("embed").len(), 8);
        assert_ne!(embedder.model_id(), StubEmbedder::new().model_id());
        assert!(matches!(
            StubEmbedder::with_dim(0),
            Err(EmbeddingError::InvalidConfig { .. })
        ));
    }
}

mod similarity_tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}

mod cache_tests {
    use super::*;

    #[test]
    fn test_second_request_served_from_cache() {
        let embedder = CountingEmbedder::new(StubEmbedder::new());
        let cache = EmbeddingCache::in_memory(100);

        let first = cache.get_or_embed(&embedder, "claim").expect("first");
        let second = cache.get_or_embed(&embedder, "claim").expect("second");

        assert_eq!(embedder.embedded_texts(), 1);
        assert_eq!(first.to_vec(), second.to_vec());
    }

    #[test]
    fn test_hit_matches_fresh_computation_bitwise() {
        let embedder = StubEmbedder::new();
        let cache = EmbeddingCache::in_memory(100);

        let cached = cache.get_or_embed(&embedder, "claim").expect("cached");
        let fresh = f16_to_f32_vec(&embedder.embed("claim").expect("fresh"));

        let cached_bits: Vec<u32> = cached.iter().map(|v| v.to_bits()).collect();
        let fresh_bits: Vec<u32> = fresh.iter().map(|v| v.to_bits()).collect();
        assert_eq!(cached_bits, fresh_bits);
    }

    #[test]
    fn test_batch_dedupes_and_reuses_entries() {
        let embedder = CountingEmbedder::new(StubEmbedder::new());
        let cache = EmbeddingCache::in_memory(100);

        cache.get_or_embed(&embedder, "a").expect("warm");
        let vectors = cache
            .get_or_embed_many(&embedder, &["a", "b", "b", "c"])
            .expect("batch");

        assert_eq!(vectors.len(), 4);
        assert_eq!(vectors[1].to_vec(), vectors[2].to_vec());
        assert_eq!(embedder.embedded_texts(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_batch_all_hits_skips_embedder() {
        let embedder = CountingEmbedder::new(StubEmbedder::new());
        let cache = EmbeddingCache::in_memory(100);

        cache.get_or_embed_many(&embedder, &["a", "b"]).expect("fill");
        let calls = embedder.calls();
        cache.get_or_embed_many(&embedder, &["b", "a"]).expect("hit");

        assert_eq!(embedder.calls(), calls);
    }

    #[test]
    fn test_models_do_not_share_entries() {
        let small = CountingEmbedder::new(StubEmbedder::with_dim(8).expect("dim"));
        let large = CountingEmbedder::new(StubEmbedder::with_dim(16).expect("dim"));
        let cache = EmbeddingCache::in_memory(100);

        assert_eq!(cache.get_or_embed(&small, "claim").expect("a").len(), 8);
        assert_eq!(cache.get_or_embed(&large, "claim").expect("b").len(), 16);
        assert_eq!(small.embedded_texts(), 1);
        assert_eq!(large.embedded_texts(), 1);
    }

    #[test]
    fn test_disk_cache_survives_restart() {
        let dir = TempDir::new().expect("temp dir");
        let embedder = CountingEmbedder::new(StubEmbedder::new());

        let first = {
            let cache = EmbeddingCache::with_disk(100, DiskStore::new(dir.path()));
            cache.get_or_embed(&embedder, "claim").expect("fill")
        };

        let cache = EmbeddingCache::with_disk(100, DiskStore::new(dir.path()));
        let second = cache.get_or_embed(&embedder, "claim").expect("reload");

        assert_eq!(embedder.embedded_texts(), 1);
        assert_eq!(first.to_vec(), second.to_vec());
    }

    #[test]
    fn test_batch_reads_disk_entries() {
        let dir = TempDir::new().expect("temp dir");
        let embedder = CountingEmbedder::new(StubEmbedder::new());

        EmbeddingCache::with_disk(100, DiskStore::new(dir.path()))
            .get_or_embed_many(&embedder, &["a", "b"])
            .expect("fill");

        let cache = EmbeddingCache::with_disk(100, DiskStore::new(dir.path()));
        cache
            .get_or_embed_many(&embedder, &["a", "b", "c"])
            .expect("reload");

        assert_eq!(embedder.embedded_texts(), 3);
    }

    #[test]
    fn test_embedder_failure_propagates() {
        let cache = EmbeddingCache::in_memory(100);

        let err = cache.get_or_embed(&FailingEmbedder, "claim").unwrap_err();
        assert!(matches!(err, EmbeddingError::FillFailed { .. }));

        let err = cache
            .get_or_embed_many(&FailingEmbedder, &["claim"])
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::InferenceFailed { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_fills_compute_once() {
        let embedder = std::sync::Arc::new(CountingEmbedder::new(StubEmbedder::new()));
        let cache = std::sync::Arc::new(EmbeddingCache::in_memory(100));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let embedder = embedder.clone();
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_embed(embedder.as_ref(), "shared claim")
                        .expect("embed")
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread");
        }

        assert_eq!(embedder.embedded_texts(), 1);
    }
}
