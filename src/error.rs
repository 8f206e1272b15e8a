use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or corrupt container, or a dataset of the wrong type
    #[error("cannot read source file {path:?}: {reason}")]
    SourceFile { path: PathBuf, reason: String },

    /// Run-length table with overlaps, unordered rows or out-of-range indices
    #[error("malformed annotation table: {0}")]
    AnnotationParse(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot write {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    pub(crate) fn source_file(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::SourceFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
