//! Error types for the mortality pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed header, row, code, cell or year reference.
    Format,
    /// Source or destination file could not be read or written.
    Io,
    /// Fewer usable data points than requested bands.
    DegenerateInput,
    /// Configuration or third-party library failure.
    Internal,
}

/// Every failure the pipeline can surface. All of them abort the run.
#[derive(Debug, Error)]
pub enum Error {
    /// Header row is missing, too short, or has unusable year labels.
    #[error("Malformed header: {reason} (header: {header:?})")]
    MalformedHeader { header: String, reason: String },

    /// A data row does not line up with the header.
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// The composite key column does not start with the expected prefix.
    #[error("Unrecognized country code {raw:?} at line {line}: expected prefix {prefix:?}")]
    UnrecognizedCode { line: u64, raw: String, prefix: String },

    /// A cell is not a number after flag stripping.
    #[error("Unparseable value {raw:?} for {country} in {year}")]
    UnparseableCell {
        country: String,
        year: String,
        raw: String,
    },

    #[error("Duplicate country code {code:?}")]
    DuplicateCode { code: String },

    /// A configured year label does not exist in the table.
    #[error("Unknown year {year:?}; available years: {available}")]
    UnknownYear { year: String, available: String },

    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not enough data points for clustering: {available} available, {requested} bands requested")]
    DegenerateInput { available: usize, requested: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Clustering failed: {0}")]
    Clustering(#[from] linfa_clustering::KMeansError),

    #[error("Table error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("Invalid region data: {0}")]
    RegionData(#[from] serde_json::Error),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MalformedHeader { .. }
            | Error::MalformedRow { .. }
            | Error::UnrecognizedCode { .. }
            | Error::UnparseableCell { .. }
            | Error::DuplicateCode { .. }
            | Error::UnknownYear { .. } => ErrorCategory::Format,
            Error::Io { .. } => ErrorCategory::Io,
            Error::DegenerateInput { .. } => ErrorCategory::DegenerateInput,
            Error::InvalidConfig(_)
            | Error::Clustering(_)
            | Error::Frame(_)
            | Error::Render(_)
            | Error::RegionData(_) => ErrorCategory::Internal,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
