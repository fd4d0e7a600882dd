//! Evaluation sweep: run a pipeline over labelled posts and aggregate ranks.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::differential::QueryComparison;
use super::error::{EvaluationError, EvaluationResult};
use super::metrics::{RankAggregator, StandardMetrics};
use super::ranks::{RankMap, predicted_ranks};
use crate::constants::{DEFAULT_NOT_FOUND_RANK, DocumentId, ROW_PREDICTION_LIMIT};
use crate::knowledge_base::Document;
use crate::pipeline::Pipeline;

/// Desired fact-check identifiers per post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruth {
    desired: HashMap<DocumentId, Vec<DocumentId>>,
}

impl GroundTruth {
    /// Builds from `(fact_check_id, post_id)` pairs. Repeated pairs are kept once.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (DocumentId, DocumentId)>,
    {
        let mut desired: HashMap<DocumentId, Vec<DocumentId>> = HashMap::new();
        for (fact_check_id, post_id) in pairs {
            let entry = desired.entry(post_id).or_default();
            if !entry.contains(&fact_check_id) {
                entry.push(fact_check_id);
            }
        }
        Self { desired }
    }

    /// Desired fact-checks for `post_id` (empty for unlabelled posts).
    pub fn desired(&self, post_id: DocumentId) -> &[DocumentId] {
        self.desired.get(&post_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, post_id: DocumentId) -> bool {
        self.desired.contains_key(&post_id)
    }

    /// Number of labelled posts.
    pub fn len(&self) -> usize {
        self.desired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desired.is_empty()
    }
}

/// What to do when the pipeline fails for one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the sweep and return the error.
    #[default]
    Abort,
    /// Log the failure and continue with the next post.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationConfig {
    /// Rank for desired ids missing from a prediction; `None` omits them.
    pub default_rank: Option<usize>,
    /// JSON-lines file receiving one [`EvaluationRow`] per evaluated post.
    pub rows_path: Option<PathBuf>,
    pub failure_policy: FailurePolicy,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            default_rank: Some(DEFAULT_NOT_FOUND_RANK),
            rows_path: None,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> EvaluationResult<()> {
        if self.default_rank == Some(0) {
            return Err(EvaluationError::InvalidConfig {
                reason: "default rank must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Row-level output for one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub run_id: Uuid,
    pub post_id: DocumentId,
    pub desired_fact_check_ids: Vec<DocumentId>,
    pub desired_fact_check_ranks: RankMap,
    /// Predicted fact-check ids, best first, truncated.
    pub predicted_fact_check_ids: Vec<DocumentId>,
    #[serde(default)]
    pub generated_output: Option<String>,
    #[serde(default)]
    pub yes_probs: Option<Vec<f32>>,
    #[serde(default)]
    pub no_probs: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub started_at: String,
    pub metrics: StandardMetrics,
    /// Posts the pipeline ran on successfully.
    pub evaluated: usize,
    /// Posts whose pipeline run failed under [`FailurePolicy::Skip`].
    pub skipped: usize,
    /// Posts without ground truth (not run).
    pub unlabeled: usize,
}

struct RowWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RowWriter {
    fn create(path: &Path) -> EvaluationResult<Self> {
        let io_err = |source| EvaluationError::RowsIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn write(&mut self, row: &EvaluationRow) -> EvaluationResult<()> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer
            .write_all(b"\n")
            .map_err(|source| EvaluationError::RowsIo {
                path: self.path.clone(),
                source,
            })
    }

    fn finish(mut self) -> EvaluationResult<()> {
        self.writer.flush().map_err(|source| EvaluationError::RowsIo {
            path: self.path.clone(),
            source,
        })
    }
}

/// Runs `pipeline` for every labelled post and computes [`StandardMetrics`].
#[instrument(skip_all, fields(posts = posts.len(), labelled = truth.len()))]
pub fn evaluate(
    pipeline: &Pipeline,
    posts: &[Document],
    truth: &GroundTruth,
    config: &EvaluationConfig,
) -> EvaluationResult<EvaluationReport> {
    config.validate()?;

    let run_id = Uuid::new_v4();
    let started_at = chrono::Utc::now().to_rfc3339();
    let mut rows = config.rows_path.as_deref().map(RowWriter::create).transpose()?;
    let mut aggregator = RankAggregator::new();
    let mut evaluated = 0usize;
    let mut skipped = 0usize;
    let mut unlabeled = 0usize;

    info!(run_id = %run_id, posts = posts.len(), "Evaluation started");

    for post in posts {
        let desired = truth.desired(post.id);
        if desired.is_empty() {
            unlabeled += 1;
            debug!(post_id = post.id, "Post has no ground truth; skipping");
            continue;
        }

        let output = match pipeline.run(&post.text) {
            Ok(output) => output,
            Err(source) => match config.failure_policy {
                FailurePolicy::Abort => {
                    return Err(EvaluationError::Pipeline {
                        post_id: post.id,
                        source,
                    });
                }
                FailurePolicy::Skip => {
                    warn!(post_id = post.id, error = %source, "Pipeline failed; post skipped");
                    skipped += 1;
                    continue;
                }
            },
        };

        let predicted = output.selected_ids();
        let ranks = predicted_ranks(&predicted, desired, config.default_rank);
        aggregator.push(&ranks);
        evaluated += 1;

        if let Some(writer) = rows.as_mut() {
            writer.write(&EvaluationRow {
                run_id,
                post_id: post.id,
                desired_fact_check_ids: desired.to_vec(),
                desired_fact_check_ranks: ranks,
                predicted_fact_check_ids: predicted
                    .iter()
                    .copied()
                    .take(ROW_PREDICTION_LIMIT)
                    .collect(),
                generated_output: output.generated_text().map(str::to_string),
                yes_probs: output.yes_probs().map(<[f32]>::to_vec),
                no_probs: output.no_probs().map(<[f32]>::to_vec),
            })?;
        }
    }

    if let Some(writer) = rows {
        writer.finish()?;
    }

    info!(ranks = aggregator.ranks_produced(), "{} ranks produced", aggregator.ranks_produced());

    let metrics = aggregator.metrics();
    info!(
        run_id = %run_id,
        evaluated,
        skipped,
        unlabeled,
        mrr = ?metrics.mrr,
        "Evaluation finished"
    );

    Ok(EvaluationReport {
        run_id,
        started_at,
        metrics,
        evaluated,
        skipped,
        unlabeled,
    })
}

/// Reads rows written by [`evaluate`]. Blank lines are ignored.
pub fn load_rows(path: &Path) -> EvaluationResult<Vec<EvaluationRow>> {
    let io_err = |source| EvaluationError::RowsIo {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|source| EvaluationError::MalformedRow {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Pairs baseline and current rows by post, in current-row order.
///
/// Posts present in only one run are left out.
pub fn compare_rows(baseline: &[EvaluationRow], current: &[EvaluationRow]) -> Vec<QueryComparison> {
    let previous: BTreeMap<DocumentId, &EvaluationRow> =
        baseline.iter().map(|row| (row.post_id, row)).collect();

    let comparisons: Vec<QueryComparison> = current
        .iter()
        .filter_map(|row| {
            previous.get(&row.post_id).map(|before| {
                QueryComparison::new(
                    row.desired_fact_check_ids.clone(),
                    before.predicted_fact_check_ids.clone(),
                    row.predicted_fact_check_ids.clone(),
                )
            })
        })
        .collect();

    let unmatched = (baseline.len() + current.len()).saturating_sub(2 * comparisons.len());
    if unmatched > 0 {
        warn!(unmatched, "Rows without a counterpart in the other run were ignored");
    }

    comparisons
}
