//! Persistent, content-addressed storage for embedding vectors.
//!
//! One `rkyv` file per key under `<root>/<model>/<key>.rkyv`. Writes go to a unique temp file
//! followed by a rename, so concurrent writers of the same key are idempotent and the last
//! rename wins. Reads go through a read-only memory map and validated archive access.

pub mod disk;
pub mod error;
pub mod mmap;
mod model;

#[cfg(test)]
mod tests;

pub use disk::{DiskStore, StorageStats};
pub use error::{StorageError, StorageResult};
pub use mmap::{MappedRecord, MmapError};
pub use model::{ArchivedEmbeddingRecord, EmbeddingRecord};
