//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Default rank must be a positive integer or `none`.
    #[error("invalid default rank '{value}': must be a positive integer or 'none'")]
    InvalidDefaultRank { value: String },

    /// Default rank string could not be parsed as a number.
    #[error("failed to parse default rank '{value}': {source}")]
    DefaultRankParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Differential top-k must be positive.
    #[error("invalid top-k '{value}': must be a positive integer")]
    InvalidTopK { value: String },

    /// Differential top-k could not be parsed as a number.
    #[error("failed to parse top-k '{value}': {source}")]
    TopKParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A required environment variable was not set.
    #[error("missing required environment variable: {name}")]
    MissingEnvVar { name: &'static str },

    /// Specified path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Path exists but is not a file (when a file was expected).
    #[error("path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
