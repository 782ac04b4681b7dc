//! Error types shared by all GAMBIT core operations

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while computing signatures, distances or classifications
#[derive(Debug, Error)]
pub enum GambitError {
    /// Unreadable or malformed sequence file, record or data file
    #[error("Input error in {file}: {message}")]
    Input { file: String, message: String },

    /// Invalid argument or mismatched output buffer, raised before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage integer type too narrow for the k-mer index space
    #[error("Index type {dtype} cannot store k-mer indices up to {max_index}")]
    OverflowRisk { dtype: String, max_index: u64 },

    /// First failure in a batch signature calculation, aborting the rest
    #[error("Batch aborted while processing {}: {source}", file.display())]
    BatchAbort {
        file: PathBuf,
        #[source]
        source: Box<GambitError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl GambitError {
    pub fn input<F: Into<String>, S: Into<String>>(file: F, message: S) -> Self {
        Self::Input {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Input error for a file on disk
    pub fn input_path<S: Into<String>>(path: &Path, message: S) -> Self {
        Self::input(path.display().to_string(), message)
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn batch_abort(file: PathBuf, source: GambitError) -> Self {
        Self::BatchAbort {
            file,
            source: Box::new(source),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type for GAMBIT core operations
pub type GambitResult<T> = Result<T, GambitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GambitError::input("genome.fa", "unexpected end of record");
        assert_eq!(err.to_string(), "Input error in genome.fa: unexpected end of record");

        let err = GambitError::OverflowRisk { dtype: "u16".to_string(), max_index: 4194303 };
        assert!(err.to_string().contains("u16"));
    }

    #[test]
    fn test_batch_abort_names_file() {
        let inner = GambitError::input("b.fa", "bad record");
        let err = GambitError::batch_abort(PathBuf::from("/data/b.fa"), inner);
        assert!(err.to_string().contains("/data/b.fa"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GambitError = io_err.into();
        assert!(matches!(err, GambitError::Io(_)));
    }
}
