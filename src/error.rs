use std::path::PathBuf;

use thiserror::Error;

use crate::select::MatchStrategy;

/// Convenience result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Error type returned by resolution, dispatch and parsing.
///
/// Parse-level errors from the underlying format libraries are carried unchanged (`Csv`,
/// `Parquet`, `Json`, ...). Every error is local to a single load call.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Excel ingestion error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV parsing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet parsing error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration could not be parsed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The glob pattern itself is malformed (e.g. an unclosed `[`).
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    /// The input does not conform to the expected schema (missing columns, incompatible parts).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// Missing/invalid base directory, malformed source spec or configuration file.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A path or pattern deliberately escapes the base directory.
    #[error("path '{path}' escapes base directory '{}'", base_directory.display())]
    PathTraversal {
        path: String,
        base_directory: PathBuf,
    },

    /// The resolved match set was empty under the active strategy.
    #[error("no files matched (strategy '{strategy}')")]
    NoMatch { strategy: MatchStrategy },

    /// An explicit format override names a handler that is not registered.
    #[error("unknown format '{name}'. registered formats: {available:?}")]
    UnknownFormat { name: String, available: Vec<String> },

    /// No registered handler accepts the source.
    #[error("no format handler found for '{source_name}'. registered formats: {available:?}")]
    UnsupportedFormat {
        source_name: String,
        available: Vec<String>,
    },

    /// Validation of a literal path or pattern found nothing loadable.
    #[error("source not found: {source_name}")]
    SourceNotFound { source_name: String },
}

impl LoadError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }
}
