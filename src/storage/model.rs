//! Storage model types.

use half::f16;
use rkyv::{Archive, Deserialize, Serialize};

/// Embedding vector persisted to disk.
///
/// Stored as `rkyv` bytes and read back through a memory map.
///
/// # Example
/// ```rust
/// use claimrank::storage::EmbeddingRecord;
/// use half::f16;
///
/// let record = EmbeddingRecord::new("stub", [7u8; 32], &[f16::from_f32(0.5)]);
/// assert_eq!(record.dim, 1);
/// assert_eq!(record.to_f16_vec(), vec![f16::from_f32(0.5)]);
/// ```
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct EmbeddingRecord {
    /// Embedding model identity the vector was produced by.
    pub model_id: String,
    /// Content-addressed key (see [`crate::hashing::embedding_key`]).
    pub key: [u8; 32],
    /// Unix timestamp when the vector was computed.
    pub created_at: i64,
    /// Number of components.
    pub dim: u32,
    /// Vector bytes (little-endian f16).
    pub vector: Vec<u8>,
}

impl EmbeddingRecord {
    pub fn new(model_id: &str, key: [u8; 32], vector: &[f16]) -> Self {
        Self {
            model_id: model_id.to_string(),
            key,
            created_at: chrono::Utc::now().timestamp(),
            dim: vector.len() as u32,
            vector: encode_f16(vector),
        }
    }

    pub fn to_f16_vec(&self) -> Vec<f16> {
        decode_f16(&self.vector)
    }
}

pub(crate) fn encode_f16(values: &[f16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn decode_f16(bytes: &[u8]) -> Vec<f16> {
    bytes
        .chunks_exact(crate::constants::F16_BYTES)
        .map(|pair| f16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
