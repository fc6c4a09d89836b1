use std::path::PathBuf;
use std::time::Duration;

use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T, E = IntersectError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum IntersectError {
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("unsupported input format for {0}: expected .csv, .tsv, .txt, .xls, .xlsx, .xlsm or .ods")]
    UnsupportedFormat(PathBuf),

    #[error("{path}: expected 3 columns (gene id, log2 fold change, p-value), found {found}")]
    ColumnCount { path: PathBuf, found: usize },

    #[error("{path}, row {row}: {reason}")]
    Malformed { path: PathBuf, row: usize, reason: String },

    #[error("annotation table {path}: {reason}")]
    AnnotationSchema { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("peak annotation failed: {0}")]
    Annotation(#[from] AnnotationError),

    #[error("could not render {chart}: {reason}")]
    Chart { chart: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failures of the external annotation step. Every variant aborts the pipeline.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("annotation tool `{0}` not found on PATH")]
    ToolNotFound(String),

    #[error("could not launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` did not finish within {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("annotation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
