//! File-per-entry embedding store.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use half::f16;
use rkyv::rancor::Error as RkyvError;
use rkyv::to_bytes;
use tracing::debug;

use crate::hashing::{hash_model_id, key_to_hex};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::mmap::MappedRecord;
use crate::storage::model::{EmbeddingRecord, decode_f16};

const RKYV_EXTENSION: &str = "rkyv";

const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Clone)]
/// Stores and retrieves [`EmbeddingRecord`]s on disk.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Creates a store rooted at `root` (created lazily on first write).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures the root storage directory exists.
    pub fn ensure_root(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).map_err(|_| StorageError::StorageUnavailable {
            path: self.root.clone(),
        })
    }

    fn model_dir(&self, model_id: &str) -> PathBuf {
        self.root.join(format!("{:016x}", hash_model_id(model_id)))
    }

    fn entry_path(&self, model_id: &str, key: &[u8; 32]) -> PathBuf {
        self.model_dir(model_id)
            .join(format!("{}.{}", key_to_hex(key), RKYV_EXTENSION))
    }

    fn temp_entry_path(&self, model_id: &str, key: &[u8; 32]) -> PathBuf {
        self.model_dir(model_id).join(format!(
            "{}.{}.{}",
            key_to_hex(key),
            uuid::Uuid::new_v4().simple(),
            TEMP_EXTENSION
        ))
    }

    /// Writes `vector` under `(model_id, key)`.
    ///
    /// Safe to call concurrently for the same key: every writer renames its own temp file
    /// over the final path, and all writers hold the same content.
    pub fn store(&self, model_id: &str, key: &[u8; 32], vector: &[f16]) -> StorageResult<()> {
        let dir = self.model_dir(model_id);
        fs::create_dir_all(&dir)
            .map_err(|_| StorageError::StorageUnavailable { path: dir.clone() })?;

        let record = EmbeddingRecord::new(model_id, *key, vector);
        let bytes = to_bytes::<RkyvError>(&record)
            .map_err(|e| StorageError::Serialization(format!("{:?}", e)))?;

        let temp_path = self.temp_entry_path(model_id, key);
        let final_path = self.entry_path(model_id, key);

        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &final_path)?;

        debug!(
            path = %final_path.display(),
            dim = vector.len(),
            "Embedding persisted"
        );
        Ok(())
    }

    /// Loads the vector stored under `(model_id, key)`, if any.
    pub fn load(&self, model_id: &str, key: &[u8; 32]) -> StorageResult<Option<Vec<f16>>> {
        let path = self.entry_path(model_id, key);

        if !path.exists() {
            return Ok(None);
        }

        let mapped = MappedRecord::open(&path)?;
        let archived = mapped.record()?;

        if archived.key != *key {
            return Err(StorageError::Corrupt {
                path,
                reason: "stored key does not match file name".to_string(),
            });
        }

        if archived.model_id.as_str() != model_id {
            return Err(StorageError::Corrupt {
                path,
                reason: format!(
                    "stored model '{}' does not match '{}'",
                    archived.model_id.as_str(),
                    model_id
                ),
            });
        }

        let vector = decode_f16(archived.vector.as_slice());
        if vector.len() != archived.dim.to_native() as usize {
            return Err(StorageError::Corrupt {
                path,
                reason: format!(
                    "stored dim {} but {} components",
                    archived.dim.to_native(),
                    vector.len()
                ),
            });
        }

        Ok(Some(vector))
    }

    /// Returns `true` if `(model_id, key)` exists.
    pub fn exists(&self, model_id: &str, key: &[u8; 32]) -> bool {
        self.entry_path(model_id, key).exists()
    }

    /// Deletes `(model_id, key)`; returns `false` if it was absent.
    pub fn remove(&self, model_id: &str, key: &[u8; 32]) -> StorageResult<bool> {
        let path = self.entry_path(model_id, key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    /// Returns basic storage stats by scanning the directory tree.
    pub fn stats(&self) -> StorageResult<StorageStats> {
        let mut stats = StorageStats::default();

        if !self.root.exists() {
            return Ok(stats);
        }

        for model_entry in fs::read_dir(&self.root)? {
            let model_path = model_entry?.path();
            if !model_path.is_dir() {
                continue;
            }
            stats.model_count += 1;

            for entry in fs::read_dir(&model_path)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == RKYV_EXTENSION) {
                    stats.entry_count += 1;
                    if let Ok(metadata) = fs::metadata(&path) {
                        stats.total_bytes += metadata.len();
                    }
                }
            }
        }

        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Aggregate stats for the embedding store directory.
pub struct StorageStats {
    /// Number of model directories.
    pub model_count: usize,
    /// Total number of entry files.
    pub entry_count: usize,
    /// Total bytes across all entry files.
    pub total_bytes: u64,
}
