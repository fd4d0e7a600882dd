use blake3::Hasher;

use crate::constants::DocumentId;

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for binding fingerprints and model directories, where a rare collision only costs
/// an extra index rebuild or a shared directory. Embedding cache keys use the full
/// 32-byte output from [`embedding_key`].
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    truncate_to_u64(hash.as_bytes())
}

#[inline]
fn truncate_to_u64(bytes: &[u8; 32]) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(head)
}

/// Content-addressed key for a document embedding.
///
/// The key depends only on the model identity and the document text, so the same claim
/// shares one cache entry across knowledge bases, cascades and process restarts.
#[inline]
pub fn embedding_key(model_id: &str, text: &str) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(&(model_id.len() as u64).to_le_bytes());
    hasher.update(model_id.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    *hasher.finalize().as_bytes()
}

#[inline]
pub fn hash_model_id(model_id: &str) -> u64 {
    hash_to_u64(model_id.as_bytes())
}

/// Fingerprint of an ordered set of documents (identity and content).
pub fn binding_fingerprint<'a, I>(documents: I) -> u64
where
    I: IntoIterator<Item = (DocumentId, &'a str)>,
{
    let mut hasher = Hasher::new();
    for (id, text) in documents {
        hasher.update(&id.to_le_bytes());
        hasher.update(&(text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    truncate_to_u64(hasher.finalize().as_bytes())
}

/// Lowercase hex rendering of a 32-byte key (used for file names).
pub fn key_to_hex(key: &[u8; 32]) -> String {
    blake3::Hash::from_bytes(*key).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_embedding_key_determinism() {
        let text = "Vaccines contain microchips.";
        assert_eq!(embedding_key("e5", text), embedding_key("e5", text));
    }

    #[test]
    fn test_embedding_key_text_sensitivity() {
        let texts = [
            "Vaccines contain microchips.",
            "vaccines contain microchips.",
            "Vaccines contain microchips. ",
            "Očkovanie obsahuje mikročipy.",
        ];

        let hashes: HashSet<_> = texts.iter().map(|t| embedding_key("e5", t)).collect();
        assert_eq!(hashes.len(), texts.len());
    }

    #[test]
    fn test_embedding_key_model_sensitivity() {
        let a = embedding_key("intfloat/multilingual-e5-large", "claim");
        let b = embedding_key("sentence-transformers/LaBSE", "claim");
        assert_ne!(a, b);
    }

    #[test]
    fn test_embedding_key_length_prefix_prevents_ambiguity() {
        let a = embedding_key("ab", "c|d");
        let b = embedding_key("ab|c", "d");
        assert_ne!(a, b);
    }

    #[test]
    fn test_binding_fingerprint_order_and_content() {
        let base = binding_fingerprint([(1, "a"), (2, "b")]);
        assert_eq!(base, binding_fingerprint([(1, "a"), (2, "b")]));
        assert_ne!(base, binding_fingerprint([(2, "b"), (1, "a")]));
        assert_ne!(base, binding_fingerprint([(1, "a"), (2, "c")]));
        assert_ne!(base, binding_fingerprint([(1, "a"), (3, "b")]));
    }

    #[test]
    fn test_binding_fingerprint_text_boundaries() {
        assert_ne!(
            binding_fingerprint([(1, "ab"), (2, "c")]),
            binding_fingerprint([(1, "a"), (2, "bc")])
        );
    }

    #[test]
    fn test_key_to_hex() {
        let hex = key_to_hex(&embedding_key("e5", "x"));
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_to_u64_determinism() {
        assert_eq!(hash_to_u64(b"model"), hash_to_u64(b"model"));
        assert_eq!(hash_model_id("model"), hash_to_u64(b"model"));
    }
}
