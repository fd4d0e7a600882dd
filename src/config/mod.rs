//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `CLAIMRANK_*` environment variables.
//! The evaluation entry point never reads the environment itself; the binary turns a
//! [`Config`] into an explicit [`EvaluationConfig`](crate::evaluation::EvaluationConfig).

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_DIFF_TOP_K, DEFAULT_EMBEDDING_CACHE_CAPACITY, DEFAULT_NOT_FOUND_RANK};

/// Harness configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `CLAIMRANK_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the persistent embedding cache. Default: `./.cache/embeddings`.
    pub cache_path: PathBuf,

    /// Max entries in the in-memory embedding cache. Default: `100_000`.
    pub cache_capacity: u64,

    /// JSON dataset (posts, fact-checks, ground-truth pairs).
    pub dataset_path: Option<PathBuf>,

    /// JSON pipeline definition.
    pub pipeline_path: Option<PathBuf>,

    /// Rank assigned to desired ids missing from a prediction. Default: `Some(100)`.
    ///
    /// `CLAIMRANK_DEFAULT_RANK=none` omits missing ids instead.
    pub default_rank: Option<usize>,

    /// Optional JSON-lines file receiving one row per evaluated post.
    pub rows_path: Option<PathBuf>,

    /// Rows of a previous run to compare against.
    pub baseline_rows_path: Option<PathBuf>,

    /// Language filter applied to posts and fact-checks.
    pub language: Option<String>,

    /// Threshold for the differential `to_top_k` metrics. Default: `10`.
    pub diff_top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("./.cache/embeddings"),
            cache_capacity: DEFAULT_EMBEDDING_CACHE_CAPACITY,
            dataset_path: None,
            pipeline_path: None,
            default_rank: Some(DEFAULT_NOT_FOUND_RANK),
            rows_path: None,
            baseline_rows_path: None,
            language: None,
            diff_top_k: DEFAULT_DIFF_TOP_K,
        }
    }
}

impl Config {
    const ENV_CACHE_PATH: &'static str = "CLAIMRANK_CACHE_PATH";
    const ENV_CACHE_CAPACITY: &'static str = "CLAIMRANK_CACHE_CAPACITY";
    const ENV_DATASET_PATH: &'static str = "CLAIMRANK_DATASET_PATH";
    const ENV_PIPELINE_PATH: &'static str = "CLAIMRANK_PIPELINE_PATH";
    const ENV_DEFAULT_RANK: &'static str = "CLAIMRANK_DEFAULT_RANK";
    const ENV_ROWS_PATH: &'static str = "CLAIMRANK_ROWS_PATH";
    const ENV_BASELINE_ROWS_PATH: &'static str = "CLAIMRANK_BASELINE_ROWS_PATH";
    const ENV_LANGUAGE: &'static str = "CLAIMRANK_LANGUAGE";
    const ENV_DIFF_TOP_K: &'static str = "CLAIMRANK_DIFF_TOP_K";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cache_path = Self::parse_path_from_env(Self::ENV_CACHE_PATH, defaults.cache_path);
        let cache_capacity =
            Self::parse_u64_from_env(Self::ENV_CACHE_CAPACITY, defaults.cache_capacity);
        let dataset_path = Self::parse_optional_path_from_env(Self::ENV_DATASET_PATH);
        let pipeline_path = Self::parse_optional_path_from_env(Self::ENV_PIPELINE_PATH);
        let default_rank = Self::parse_default_rank_from_env(defaults.default_rank)?;
        let rows_path = Self::parse_optional_path_from_env(Self::ENV_ROWS_PATH);
        let baseline_rows_path = Self::parse_optional_path_from_env(Self::ENV_BASELINE_ROWS_PATH);
        let language = Self::parse_optional_string_from_env(Self::ENV_LANGUAGE);
        let diff_top_k = Self::parse_top_k_from_env(defaults.diff_top_k)?;

        Ok(Self {
            cache_path,
            cache_capacity,
            dataset_path,
            pipeline_path,
            default_rank,
            rows_path,
            baseline_rows_path,
            language,
            diff_top_k,
        })
    }

    /// Validates paths and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_path.exists() && !self.cache_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.cache_path.clone(),
            });
        }

        for path in [
            &self.dataset_path,
            &self.pipeline_path,
            &self.baseline_rows_path,
        ]
        .into_iter()
        .flatten()
        {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        if self.default_rank == Some(0) {
            return Err(ConfigError::InvalidDefaultRank {
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the dataset path or a [`ConfigError::MissingEnvVar`].
    pub fn require_dataset_path(&self) -> Result<&PathBuf, ConfigError> {
        self.dataset_path
            .as_ref()
            .ok_or(ConfigError::MissingEnvVar {
                name: Self::ENV_DATASET_PATH,
            })
    }

    /// Returns the pipeline path or a [`ConfigError::MissingEnvVar`].
    pub fn require_pipeline_path(&self) -> Result<&PathBuf, ConfigError> {
        self.pipeline_path
            .as_ref()
            .ok_or(ConfigError::MissingEnvVar {
                name: Self::ENV_PIPELINE_PATH,
            })
    }

    fn parse_default_rank_from_env(default: Option<usize>) -> Result<Option<usize>, ConfigError> {
        match env::var(Self::ENV_DEFAULT_RANK) {
            Ok(value) => {
                let trimmed = value.trim();
                if trimmed.eq_ignore_ascii_case("none") || trimmed.is_empty() {
                    return Ok(None);
                }

                let rank: usize =
                    trimmed
                        .parse()
                        .map_err(|e| ConfigError::DefaultRankParseError {
                            value: value.clone(),
                            source: e,
                        })?;

                if rank == 0 {
                    return Err(ConfigError::InvalidDefaultRank { value });
                }

                Ok(Some(rank))
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_top_k_from_env(default: usize) -> Result<usize, ConfigError> {
        match env::var(Self::ENV_DIFF_TOP_K) {
            Ok(value) => {
                let top_k: usize = value
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::TopKParseError {
                        value: value.clone(),
                        source: e,
                    })?;

                if top_k == 0 {
                    return Err(ConfigError::InvalidTopK { value });
                }

                Ok(top_k)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        Self::parse_optional_string_from_env(var_name).map(PathBuf::from)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
