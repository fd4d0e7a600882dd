//! Content-addressed embedding cache (in-memory front, optional on-disk backing).
//!
//! Keys are [`embedding_key`]s over (model id, text), so one entry serves every knowledge base
//! that contains the same claim. A miss loads from disk, or computes and persists, before
//! returning (fill-on-read). Hits and fresh computations both pass through the stored `f16`
//! representation, so repeated requests return bit-identical vectors.

use std::collections::HashMap;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::{debug, warn};

use super::error::{EmbeddingError, EmbeddingResult};
use super::{Embedder, f16_to_f32_vec};
use crate::constants::DEFAULT_EMBEDDING_CACHE_CAPACITY;
use crate::hashing::embedding_key;
use crate::storage::DiskStore;

pub struct EmbeddingCache {
    entries: Cache<[u8; 32], Arc<[f32]>>,
    disk: Option<DiskStore>,
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("entries", &self.entries.entry_count())
            .field("disk", &self.disk.as_ref().map(|d| d.root().to_path_buf()))
            .finish()
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::in_memory(DEFAULT_EMBEDDING_CACHE_CAPACITY)
    }
}

impl EmbeddingCache {
    /// Memory-only cache (entries are lost with the process).
    pub fn in_memory(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
            disk: None,
        }
    }

    /// Cache persisted to `disk`, surviving process restarts.
    pub fn with_disk(capacity: u64, disk: DiskStore) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
            disk: Some(disk),
        }
    }

    pub fn disk(&self) -> Option<&DiskStore> {
        self.disk.as_ref()
    }

    /// Number of entries held in memory.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached vector for `text`, computing it on a miss.
    ///
    /// Concurrent misses for the same key are coalesced into one computation.
    pub fn get_or_embed<E>(&self, embedder: &E, text: &str) -> EmbeddingResult<Arc<[f32]>>
    where
        E: Embedder + ?Sized,
    {
        let key = embedding_key(embedder.model_id(), text);

        self.entries
            .try_get_with(key, || self.load_or_compute(embedder, &key, text))
            .map_err(|e| EmbeddingError::FillFailed {
                reason: e.to_string(),
            })
    }

    /// Batch form of [`get_or_embed`](Self::get_or_embed); output order matches `texts`.
    ///
    /// Misses (deduplicated by key) are sent to [`Embedder::embed_batch`] in one call.
    pub fn get_or_embed_many<E>(
        &self,
        embedder: &E,
        texts: &[&str],
    ) -> EmbeddingResult<Vec<Arc<[f32]>>>
    where
        E: Embedder + ?Sized,
    {
        let model_id = embedder.model_id();
        let keys: Vec<[u8; 32]> = texts.iter().map(|t| embedding_key(model_id, t)).collect();

        let mut resolved: HashMap<[u8; 32], Arc<[f32]>> = HashMap::with_capacity(texts.len());
        let mut missing_keys: Vec<[u8; 32]> = Vec::new();
        let mut missing_texts: Vec<&str> = Vec::new();

        for (key, &text) in keys.iter().zip(texts.iter()) {
            if resolved.contains_key(key) || missing_keys.contains(key) {
                continue;
            }
            if let Some(vector) = self.entries.get(key) {
                resolved.insert(*key, vector);
                continue;
            }
            if let Some(vector) = self.load_from_disk(model_id, key) {
                self.entries.insert(*key, vector.clone());
                resolved.insert(*key, vector);
                continue;
            }
            missing_keys.push(*key);
            missing_texts.push(text);
        }

        if !missing_texts.is_empty() {
            debug!(
                model_id,
                requested = texts.len(),
                computing = missing_texts.len(),
                "Embedding cache misses"
            );

            let computed = embedder.embed_batch(&missing_texts)?;
            if computed.len() != missing_texts.len() {
                return Err(EmbeddingError::BatchSizeMismatch {
                    expected: missing_texts.len(),
                    actual: computed.len(),
                });
            }

            for (key, vector) in missing_keys.iter().zip(computed) {
                self.persist(model_id, key, &vector);
                let vector: Arc<[f32]> = f16_to_f32_vec(&vector).into();
                self.entries.insert(*key, vector.clone());
                resolved.insert(*key, vector);
            }
        }

        keys.iter()
            .map(|key| {
                resolved
                    .get(key)
                    .cloned()
                    .ok_or_else(|| EmbeddingError::FillFailed {
                        reason: "key missing after batch fill".to_string(),
                    })
            })
            .collect()
    }

    fn load_or_compute<E>(
        &self,
        embedder: &E,
        key: &[u8; 32],
        text: &str,
    ) -> EmbeddingResult<Arc<[f32]>>
    where
        E: Embedder + ?Sized,
    {
        let model_id = embedder.model_id();

        if let Some(vector) = self.load_from_disk(model_id, key) {
            return Ok(vector);
        }

        let vector = embedder.embed(text)?;
        self.persist(model_id, key, &vector);
        Ok(f16_to_f32_vec(&vector).into())
    }

    fn load_from_disk(&self, model_id: &str, key: &[u8; 32]) -> Option<Arc<[f32]>> {
        let disk = self.disk.as_ref()?;
        match disk.load(model_id, key) {
            Ok(Some(vector)) => Some(f16_to_f32_vec(&vector).into()),
            Ok(None) => None,
            Err(e) => {
                warn!(model_id, error = %e, "Unreadable embedding entry; recomputing");
                None
            }
        }
    }

    fn persist(&self, model_id: &str, key: &[u8; 32], vector: &[half::f16]) {
        if let Some(disk) = &self.disk
            && let Err(e) = disk.store(model_id, key, vector)
        {
            warn!(model_id, error = %e, "Failed to persist embedding");
        }
    }
}
