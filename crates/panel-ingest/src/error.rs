//! Error types for source file ingestion.

use std::path::{Path, PathBuf};

use panel_model::PanelError;
use thiserror::Error;

/// Errors raised while discovering or reading source files.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Directory not found or not readable.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to read directory entries.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV file not found.
    #[error("CSV file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse CSV content.
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV file has no header row.
    #[error("CSV file is empty: {path}")]
    EmptyCsv { path: PathBuf },

    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl IngestError {
    pub(crate) fn csv(path: &Path, error: &csv::Error) -> Self {
        if let csv::ErrorKind::Io(io) = error.kind() {
            if io.kind() == std::io::ErrorKind::NotFound {
                return Self::FileNotFound {
                    path: path.to_path_buf(),
                };
            }
        }
        Self::CsvParse {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }

    /// File or directory the error refers to.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::DirectoryNotFound { path }
            | Self::DirectoryRead { path, .. }
            | Self::FileNotFound { path }
            | Self::FileRead { path, .. }
            | Self::CsvParse { path, .. }
            | Self::EmptyCsv { path } => Some(path),
            Self::DataFrame { .. } => None,
        }
    }
}

impl From<polars::prelude::PolarsError> for IngestError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

impl From<IngestError> for PanelError {
    fn from(err: IngestError) -> Self {
        match err.path() {
            Some(path) => PanelError::FileRead {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
            None => PanelError::Frame(err.to_string()),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::FileNotFound {
            path: PathBuf::from("/data/FAM1999.csv"),
        };
        assert_eq!(err.to_string(), "CSV file not found: /data/FAM1999.csv");
    }

    #[test]
    fn test_error_into_panel_error() {
        let err = IngestError::EmptyCsv {
            path: PathBuf::from("WLTH2001.csv"),
        };
        let panel: PanelError = err.into();
        assert!(matches!(panel, PanelError::FileRead { ref path, .. } if path == Path::new("WLTH2001.csv")));

        let polars_err = polars::prelude::PolarsError::ColumnNotFound("ER1".into());
        let panel: PanelError = IngestError::from(polars_err).into();
        assert!(matches!(panel, PanelError::Frame(_)));
    }
}
