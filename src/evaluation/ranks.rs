//! Rank of each desired identifier within a predicted ordering.

use std::collections::BTreeMap;

use crate::constants::DocumentId;

/// Desired identifier → 1-based rank.
pub type RankMap = BTreeMap<DocumentId, usize>;

/// Ranks every desired identifier by its first occurrence in `predicted`.
///
/// Identifiers missing from `predicted` get `default_rank`, or are left out of the map when
/// it is `None` (they then count towards no aggregate).
pub fn predicted_ranks(
    predicted: &[DocumentId],
    desired: &[DocumentId],
    default_rank: Option<usize>,
) -> RankMap {
    desired
        .iter()
        .filter_map(|&id| {
            predicted
                .iter()
                .position(|&candidate| candidate == id)
                .map(|idx| idx + 1)
                .or(default_rank)
                .map(|rank| (id, rank))
        })
        .collect()
}
