use serde::{Deserialize, Serialize};

/// One audit line per (year, source file) visited by an extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    pub year: i32,
    pub file: String,
    /// Newly claimed columns loaded from this file.
    pub present_cols: usize,
    /// Required canonicals still without a source column after this file.
    pub missing_required: usize,
    pub duplicate_canonicals_resolved: usize,
    pub duplicate_canonicals_unresolved: usize,
}

impl AuditRow {
    pub fn new(year: i32, file: impl Into<String>) -> Self {
        Self {
            year,
            file: file.into(),
            present_cols: 0,
            missing_required: 0,
            duplicate_canonicals_resolved: 0,
            duplicate_canonicals_unresolved: 0,
        }
    }
}
