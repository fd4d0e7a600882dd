//! Memory-mapped embedding record files.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use rkyv::rancor::Error as RkyvError;
use thiserror::Error;

use super::model::ArchivedEmbeddingRecord;

/// Alignment `rkyv` needs for in-place access; page-aligned mappings always satisfy it.
pub const RECORD_ALIGNMENT: usize = 16;

#[derive(Error, Debug)]
pub enum MmapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record file is empty")]
    EmptyFile,

    #[error("record validation failed: {0}")]
    ValidationFailed(String),

    #[error("record bytes are not aligned to {alignment} bytes")]
    AlignmentError { alignment: usize },
}

pub type MmapResult<T> = Result<T, MmapError>;

/// A read-only mapping of one `.rkyv` record file.
pub struct MappedRecord {
    mmap: Mmap,
    path: PathBuf,
}

impl std::fmt::Debug for MappedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRecord")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .finish()
    }
}

impl MappedRecord {
    pub fn open(path: &Path) -> MmapResult<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(MmapError::EmptyFile);
        }

        // SAFETY: record files are only ever replaced by rename, never written in place,
        // so the mapped inode is immutable for the lifetime of the mapping.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validates and returns the archived record.
    pub fn record(&self) -> MmapResult<&ArchivedEmbeddingRecord> {
        let bytes: &[u8] = &self.mmap;
        if !(bytes.as_ptr() as usize).is_multiple_of(RECORD_ALIGNMENT) {
            return Err(MmapError::AlignmentError {
                alignment: RECORD_ALIGNMENT,
            });
        }

        rkyv::access::<ArchivedEmbeddingRecord, RkyvError>(bytes)
            .map_err(|e| MmapError::ValidationFailed(e.to_string()))
    }
}
