use std::path::PathBuf;
use thiserror::Error;

use crate::storage::mmap::MmapError;

#[derive(Error, Debug)]
/// Errors returned by the on-disk embedding store.
pub enum StorageError {
    /// IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mmap error.
    #[error("mmap error: {0}")]
    Mmap(#[from] MmapError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored record does not belong to the requested key.
    #[error("corrupt record at {path}: {reason}")]
    Corrupt {
        /// Offending file.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },

    /// Storage root path is missing/unavailable.
    #[error("storage path unavailable: {path}")]
    StorageUnavailable {
        /// Path that was unavailable.
        path: PathBuf,
    },
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
