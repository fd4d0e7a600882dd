//! Differential comparison of two runs over the same queries.
//!
//! For every relevant identifier the previous and current ranks are computed with a fixed
//! "not found" rank. Real ranks beyond it are capped to it, so a deep item that disappears
//! counts as removed but never as improved. Shifts are `previous - current` (positive means
//! the item moved up).
//! Ratios whose denominator is zero are reported as [`Percentage::UNDEFINED`].

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};

use super::ranks::predicted_ranks;
use crate::constants::{DEFAULT_DIFF_TOP_K, DEFAULT_NOT_FOUND_RANK, DocumentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifferentialConfig {
    /// Rank assigned to relevant items missing from a run.
    pub not_found_rank: usize,
    /// Threshold for the `to_top_k` counts.
    pub top_k: usize,
}

impl Default for DifferentialConfig {
    fn default() -> Self {
        Self {
            not_found_rank: DEFAULT_NOT_FOUND_RANK,
            top_k: DEFAULT_DIFF_TOP_K,
        }
    }
}

/// One query's relevant set and its predictions in both runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryComparison {
    pub relevant: Vec<DocumentId>,
    pub previous: Vec<DocumentId>,
    pub current: Vec<DocumentId>,
}

impl QueryComparison {
    pub fn new(relevant: Vec<DocumentId>, previous: Vec<DocumentId>, current: Vec<DocumentId>) -> Self {
        Self {
            relevant,
            previous,
            current,
        }
    }

    /// Relevant identifiers without repeats, in first-seen order.
    fn unique_relevant(&self) -> Vec<DocumentId> {
        let mut seen = HashSet::with_capacity(self.relevant.len());
        self.relevant
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// A ratio that may be undefined (zero denominator).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentage(pub Option<f64>);

impl Percentage {
    pub const UNDEFINED: Percentage = Percentage(None);

    pub fn ratio(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            Self::UNDEFINED
        } else {
            Percentage(Some(numerator as f64 / denominator as f64))
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn is_defined(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{:.4}", value),
            None => f.write_str("undefined"),
        }
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_str("undefined"),
        }
    }
}

/// Rank movement of relevant items between two runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderShift {
    /// Per query, per unique relevant item: `previous_rank - current_rank`.
    pub shifts: Vec<Vec<i64>>,
    /// Items whose rank strictly improved.
    pub increase_number: usize,
    /// Items not already at rank 1 in the previous run.
    pub increased_possible: usize,
    /// Items found previously and missing now.
    pub removed_number: usize,
    /// Items that moved from outside the top-k to inside it.
    pub total_to_top_k: usize,
    /// Items outside the top-k in the previous run.
    pub increased_possible_top_k: usize,
}

impl OrderShift {
    pub fn increased_percentage(&self) -> Percentage {
        Percentage::ratio(self.increase_number, self.increased_possible)
    }

    pub fn top_k_percentage(&self) -> Percentage {
        Percentage::ratio(self.total_to_top_k, self.increased_possible_top_k)
    }
}

pub fn increase_in_order(queries: &[QueryComparison], config: &DifferentialConfig) -> OrderShift {
    let mut result = OrderShift::default();
    let capped = |found: Option<usize>| {
        found.map_or(config.not_found_rank, |rank| rank.min(config.not_found_rank))
    };

    for query in queries {
        let relevant = query.unique_relevant();
        let previous = predicted_ranks(&query.previous, &relevant, None);
        let current = predicted_ranks(&query.current, &relevant, None);

        let mut shifts = Vec::with_capacity(relevant.len());
        for id in &relevant {
            let previous_found = previous.get(id).copied();
            let current_found = current.get(id).copied();
            let previous_rank = capped(previous_found);
            let current_rank = capped(current_found);

            shifts.push(previous_rank as i64 - current_rank as i64);
            if previous_rank != 1 {
                result.increased_possible += 1;
            }
            if previous_rank > config.top_k {
                result.increased_possible_top_k += 1;
            }
            if previous_rank > current_rank {
                result.increase_number += 1;
                if previous_rank > config.top_k && current_rank <= config.top_k {
                    result.total_to_top_k += 1;
                }
            }
            if previous_found.is_some() && current_found.is_none() {
                result.removed_number += 1;
            }
        }
        result.shifts.push(shifts);
    }

    result
}

/// Previously returned documents that are absent from the current run, split by relevance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemovalCounts {
    pub relevant_removed: usize,
    pub irrelevant_removed: usize,
    /// Relevant documents in the previous run.
    pub relevant_total: usize,
    /// Irrelevant documents in the previous run.
    pub irrelevant_total: usize,
}

impl RemovalCounts {
    pub fn relevant_percentage(&self) -> Percentage {
        Percentage::ratio(self.relevant_removed, self.relevant_total)
    }

    pub fn irrelevant_percentage(&self) -> Percentage {
        Percentage::ratio(self.irrelevant_removed, self.irrelevant_total)
    }
}

/// Counts removals per query; repeated identifiers within one prediction count once.
pub fn removal_counts(queries: &[QueryComparison]) -> RemovalCounts {
    let mut counts = RemovalCounts::default();

    for query in queries {
        let relevant: HashSet<DocumentId> = query.relevant.iter().copied().collect();
        let current: HashSet<DocumentId> = query.current.iter().copied().collect();
        let previous: HashSet<DocumentId> = query.previous.iter().copied().collect();

        for id in previous {
            let removed = !current.contains(&id);
            if relevant.contains(&id) {
                counts.relevant_total += 1;
                counts.relevant_removed += usize::from(removed);
            } else {
                counts.irrelevant_total += 1;
                counts.irrelevant_removed += usize::from(removed);
            }
        }
    }

    counts
}

/// Summary of a differential comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferentialMetrics {
    pub irrelevant_percentage: Percentage,
    pub relevant_percentage: Percentage,
    pub increased: usize,
    pub increased_percentage: Percentage,
    pub to_top_k: usize,
    pub top_k_percentage: Percentage,
    pub removed: usize,
}

pub fn advanced_metrics(queries: &[QueryComparison], config: &DifferentialConfig) -> DifferentialMetrics {
    let removals = removal_counts(queries);
    let shift = increase_in_order(queries, config);

    DifferentialMetrics {
        irrelevant_percentage: removals.irrelevant_percentage(),
        relevant_percentage: removals.relevant_percentage(),
        increased: shift.increase_number,
        increased_percentage: shift.increased_percentage(),
        to_top_k: shift.total_to_top_k,
        top_k_percentage: shift.top_k_percentage(),
        removed: shift.removed_number,
    }
}
