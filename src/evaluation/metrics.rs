//! Aggregate metrics over many rank maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ranks::RankMap;
use crate::constants::SUCCESS_AT_K;

/// Collects per-query ranks during a sweep.
///
/// A query contributes to query-level metrics only if it produced at least one rank.
#[derive(Debug, Clone, Default)]
pub struct RankAggregator {
    best_ranks: Vec<usize>,
    rank_sum: u64,
    produced: usize,
}

impl RankAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ranks: &RankMap) {
        self.produced += ranks.len();
        self.rank_sum += ranks.values().map(|&rank| rank as u64).sum::<u64>();
        if let Some(&best) = ranks.values().min() {
            self.best_ranks.push(best);
        }
    }

    /// Total ranks pushed so far, across all queries.
    pub fn ranks_produced(&self) -> usize {
        self.produced
    }

    /// Queries that produced at least one rank.
    pub fn queries(&self) -> usize {
        self.best_ranks.len()
    }

    pub fn metrics(&self) -> StandardMetrics {
        let queries = self.best_ranks.len();
        if queries == 0 {
            return StandardMetrics {
                queries,
                ranks: self.produced,
                ..StandardMetrics::default()
            };
        }

        let n = queries as f64;
        let mrr = self
            .best_ranks
            .iter()
            .map(|&rank| 1.0 / rank as f64)
            .sum::<f64>()
            / n;
        let success_at = SUCCESS_AT_K
            .iter()
            .map(|&k| {
                let hits = self.best_ranks.iter().filter(|&&rank| rank <= k).count();
                (k, hits as f64 / n)
            })
            .collect();

        StandardMetrics {
            queries,
            ranks: self.produced,
            mrr: Some(mrr),
            mean_rank: Some(self.rank_sum as f64 / self.produced as f64),
            success_at,
        }
    }
}

/// Mean reciprocal rank and success@k over each query's best rank, plus the mean of all ranks.
///
/// Every ratio is `None` when no query produced a rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardMetrics {
    pub queries: usize,
    pub ranks: usize,
    pub mrr: Option<f64>,
    pub mean_rank: Option<f64>,
    pub success_at: BTreeMap<usize, f64>,
}

impl StandardMetrics {
    pub fn success_at(&self, k: usize) -> Option<f64> {
        self.success_at.get(&k).copied()
    }
}

/// Computes [`StandardMetrics`] for a batch of rank maps.
pub fn standard_metrics<'a, I>(ranks: I) -> StandardMetrics
where
    I: IntoIterator<Item = &'a RankMap>,
{
    let mut aggregator = RankAggregator::new();
    for query in ranks {
        aggregator.push(query);
    }
    aggregator.metrics()
}
