//! Ranking evaluation engine.
//!
//! - [`predicted_ranks`]: 1-based rank of each desired id in a prediction.
//! - [`RankAggregator`] / [`standard_metrics`]: MRR, success@k and mean rank over a sweep.
//! - [`increase_in_order`] / [`advanced_metrics`]: differential comparison of two runs.
//! - [`evaluate`]: runs a [`Pipeline`](crate::pipeline::Pipeline) over labelled posts.

pub mod differential;
pub mod error;
pub mod metrics;
pub mod ranks;
pub mod sweep;


pub use differential::{
    DifferentialConfig, DifferentialMetrics, OrderShift, Percentage, QueryComparison,
    RemovalCounts, advanced_metrics, increase_in_order, removal_counts,
};
pub use error::{EvaluationError, EvaluationResult};
pub use metrics::{RankAggregator, StandardMetrics, standard_metrics};
pub use ranks::{RankMap, predicted_ranks};
pub use sweep::{
    EvaluationConfig, EvaluationReport, EvaluationRow, FailurePolicy, GroundTruth, compare_rows,
    evaluate, load_rows,
};
