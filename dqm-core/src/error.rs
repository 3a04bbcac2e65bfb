/// Structured error types for dqm-core.
///
/// Uses `thiserror` so library consumers get composable errors.
/// The `dqmctl` binary wraps these in `anyhow` at command boundaries.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dqm-core operations
#[derive(Error, Debug)]
pub enum DqmError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// CSV decoding failed at a known position
    #[error("CSV error in {path:?} at line {line}: {source}")]
    Csv {
        path: PathBuf,
        line: u64,
        source: csv::Error,
    },

    /// Required column missing from the CSV header
    #[error("Missing required column '{column}' in {path:?}")]
    MissingColumn { column: String, path: PathBuf },

    /// File or directory not found
    #[error("Path not found: {path:?}")]
    PathNotFound { path: PathBuf },

    /// Empty input file (no header row)
    #[error("Empty input file: {path:?}")]
    EmptyFile { path: PathBuf },

    /// Invalid user input
    #[error("Validation error: {reason}")]
    Validation { reason: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for dqm-core operations
pub type Result<T> = std::result::Result<T, DqmError>;

impl DqmError {
    /// Create a CSV error, recording the line the reader stopped at
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        let line = source.position().map(|pos| pos.line()).unwrap_or(0);
        Self::Csv {
            path: path.into(),
            line,
            source,
        }
    }

    /// Create a missing column error
    pub fn missing_column(column: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            path: path.into(),
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Create an empty file error
    pub fn empty_file(path: impl Into<PathBuf>) -> Self {
        Self::EmptyFile { path: path.into() }
    }

    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DqmError::missing_column("fromrun", "/tmp/histos.csv");
        assert_eq!(
            err.to_string(),
            "Missing required column 'fromrun' in \"/tmp/histos.csv\""
        );

        let err = DqmError::validation("Can't return ids if pk is None");
        assert!(err.to_string().contains("pk is None"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let dqm_err: DqmError = io_err.into();

        assert!(matches!(dqm_err, DqmError::Io { .. }));
    }
}
