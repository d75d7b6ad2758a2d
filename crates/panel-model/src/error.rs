use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    /// The mapping table lacks one or more expected columns.
    #[error("mapping is missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("invalid year '{value}' on mapping line {line}")]
    YearParse { value: String, line: usize },

    #[error("invalid {field} '{value}' on mapping line {line}")]
    InvalidField {
        field: &'static str,
        value: String,
        line: usize,
    },

    #[error("invalid year filter token '{token}'")]
    YearFilter { token: String },

    #[error("transform for {canonical}: token '{token}' {reason}")]
    TransformParse {
        canonical: String,
        token: String,
        reason: String,
    },

    /// Several source columns for one canonical with no strategy to collapse them.
    #[error(
        "{canonical} has {columns} source columns in {year} but no duplicate strategy; keeping the first"
    )]
    DuplicateCanonical {
        canonical: String,
        year: i32,
        columns: usize,
    },

    #[error("var code {var_code} in {year} maps to both {first} and {second}")]
    VarCodeConflict {
        var_code: String,
        year: i32,
        first: String,
        second: String,
    },

    #[error("{canonical}: {message}")]
    MetadataConflict { canonical: String, message: String },

    #[error("{canonical}: cannot coerce to {dtype}: {reason}")]
    DtypeCoercion {
        canonical: String,
        dtype: String,
        reason: String,
    },

    #[error("failed to read {path}: {message}")]
    FileRead { path: PathBuf, message: String },

    #[error("{0}")]
    EmptySelection(String),

    /// A concept grid table that cannot be read back.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("frame operation failed: {0}")]
    Frame(String),

    #[error("worker pool: {0}")]
    WorkerPool(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PanelError {
    /// Canonical variable the error refers to, if any.
    pub fn canonical(&self) -> Option<&str> {
        match self {
            Self::TransformParse { canonical, .. }
            | Self::DuplicateCanonical { canonical, .. }
            | Self::MetadataConflict { canonical, .. }
            | Self::DtypeCoercion { canonical, .. } => Some(canonical),
            Self::VarCodeConflict { first, .. } => Some(first),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PanelError>;
