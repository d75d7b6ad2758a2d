//! Run configuration shared by the extraction crates.

use serde::{Deserialize, Serialize};

/// How ambiguities in the mapping or the data are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Abort on the first ambiguity.
    Strict,
    /// Record ambiguities as warnings and continue with a fallback.
    #[default]
    Permissive,
}

impl RunMode {
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// Options carried by every year task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Run the per-canonical transform DSL.
    pub apply_transforms: bool,
    /// Coerce each canonical to its declared dtype.
    pub coerce_types: bool,
    /// Cap on data rows read from each source file.
    pub sample_rows: Option<usize>,
    pub mode: RunMode,
    /// Panel columns to sort by after `year`; they follow `year` in the output.
    pub index_cols: Vec<String>,
}

impl ExtractionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict mode with transforms and dtype coercion enabled.
    pub fn strict() -> Self {
        Self {
            apply_transforms: true,
            coerce_types: true,
            sample_rows: None,
            mode: RunMode::Strict,
            index_cols: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_transforms(mut self, enable: bool) -> Self {
        self.apply_transforms = enable;
        self
    }

    #[must_use]
    pub fn with_coerce_types(mut self, enable: bool) -> Self {
        self.coerce_types = enable;
        self
    }

    #[must_use]
    pub fn with_sample_rows(mut self, rows: Option<usize>) -> Self {
        self.sample_rows = rows;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_index_cols(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.index_cols = columns.into_iter().collect();
        self
    }
}
