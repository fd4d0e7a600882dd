use super::*;
use crate::hashing::embedding_key;
use half::f16;
use rkyv::rancor::Error;
use rkyv::{from_bytes, to_bytes};
use tempfile::TempDir;

fn create_test_store() -> (DiskStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = DiskStore::new(dir.path().join("embeddings"));
    (store, dir)
}

fn vector(values: &[f32]) -> Vec<f16> {
    values.iter().map(|&v| f16::from_f32(v)).collect()
}

#[test]
fn test_store_and_load() {
    let (store, _dir) = create_test_store();
    let key = embedding_key("stub", "Vaccines contain microchips.");
    let v = vector(&[0.25, -0.5, 1.0]);

    store.store("stub", &key, &v).expect("store");

    assert!(store.exists("stub", &key));
    let loaded = store.load("stub", &key).expect("load").expect("present");
    assert_eq!(loaded, v);
}

#[test]
fn test_load_missing_is_none() {
    let (store, _dir) = create_test_store();
    let key = embedding_key("stub", "never stored");

    assert!(store.load("stub", &key).expect("load").is_none());
    assert!(!store.exists("stub", &key));
}

#[test]
fn test_models_are_isolated() {
    let (store, _dir) = create_test_store();
    let key = embedding_key("model-a", "claim");

    store.store("model-a", &key, &vector(&[1.0])).expect("store");

    assert!(store.load("model-b", &key).expect("load").is_none());
}

#[test]
fn test_overwrite_is_idempotent() {
    let (store, _dir) = create_test_store();
    let key = embedding_key("stub", "claim");
    let v = vector(&[0.1, 0.2]);

    store.store("stub", &key, &v).expect("first");
    store.store("stub", &key, &v).expect("second");

    assert_eq!(store.load("stub", &key).expect("load"), Some(v));
    let stats = store.stats().expect("stats");
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.model_count, 1);
    assert!(stats.total_bytes > 0);
}

#[test]
fn test_survives_reopen() {
    let (store, _dir) = create_test_store();
    let key = embedding_key("stub", "claim");
    let v = vector(&[0.75, 0.5]);
    store.store("stub", &key, &v).expect("store");

    let reopened = DiskStore::new(store.root().to_path_buf());
    assert_eq!(reopened.load("stub", &key).expect("load"), Some(v));
}

#[test]
fn test_remove() {
    let (store, _dir) = create_test_store();
    let key = embedding_key("stub", "claim");
    store.store("stub", &key, &vector(&[1.0])).expect("store");

    assert!(store.remove("stub", &key).expect("remove"));
    assert!(!store.remove("stub", &key).expect("remove again"));
    assert!(!store.exists("stub", &key));
}

#[test]
fn test_stats_on_missing_root() {
    let (store, _dir) = create_test_store();
    assert_eq!(store.stats().expect("stats"), StorageStats::default());
}

#[test]
fn test_corrupt_file_is_reported() {
    let (store, _dir) = create_test_store();
    let key = embedding_key("stub", "claim");
    let other = embedding_key("stub", "other claim");
    store.store("stub", &other, &vector(&[1.0])).expect("store");

    let model_dir = store.root().join(format!(
        "{:016x}",
        crate::hashing::hash_model_id("stub")
    ));
    std::fs::rename(
        model_dir.join(format!("{}.rkyv", crate::hashing::key_to_hex(&other))),
        model_dir.join(format!("{}.rkyv", crate::hashing::key_to_hex(&key))),
    )
    .expect("rename");

    let err = store.load("stub", &key).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
}

#[test]
fn test_record_serialization_roundtrip() {
    let record = EmbeddingRecord::new("stub", [3u8; 32], &vector(&[0.5, -0.25]));

    let bytes = to_bytes::<Error>(&record).expect("serialize");
    let restored: EmbeddingRecord = from_bytes::<EmbeddingRecord, Error>(&bytes).expect("deserialize");

    assert_eq!(restored, record);
    assert_eq!(restored.to_f16_vec(), vector(&[0.5, -0.25]));
}

#[test]
fn test_mmap_empty_file_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("empty.rkyv");
    std::fs::write(&path, b"").expect("write");

    let err = MappedRecord::open(&path).unwrap_err();
    assert!(matches!(err, MmapError::EmptyFile));
}
