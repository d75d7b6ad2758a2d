use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Survey sub-file a source variable code comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    /// Family-level file.
    Fam,
    /// Wealth supplement file.
    Wlth,
}

impl FileType {
    pub const ALL: [FileType; 2] = [FileType::Fam, FileType::Wlth];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fam => "FAM",
            Self::Wlth => "WLTH",
        }
    }

    /// Module whose name prefixes `file_name`, ignoring case.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let upper = file_name.to_uppercase();
        Self::ALL
            .into_iter()
            .find(|module| upper.starts_with(module.as_str()))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "FAM" => Ok(Self::Fam),
            "WLTH" => Ok(Self::Wlth),
            other => Err(format!("unknown module '{other}'")),
        }
    }
}

/// Declared output dtype of a canonical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnDtype {
    Int64,
    Float64,
    String,
    /// Stored as text in the panel.
    Category,
}

impl ColumnDtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for ColumnDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnDtype {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "int64" => Ok(Self::Int64),
            "float64" => Ok(Self::Float64),
            "string" => Ok(Self::String),
            "category" => Ok(Self::Category),
            other => Err(format!("unsupported dtype '{other}'")),
        }
    }
}

/// One row of the mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRow {
    pub canonical: String,
    pub year: i32,
    pub file_type: FileType,
    pub var_code: String,
    pub label: String,
    pub category: String,
    pub dtype: Option<ColumnDtype>,
    pub required: bool,
    /// Raw transform DSL cell.
    pub transform: String,
    /// 1-based line in the mapping file (0 when built in memory).
    #[serde(default)]
    pub line: usize,
}

impl MappingRow {
    pub fn new(
        canonical: impl Into<String>,
        year: i32,
        file_type: FileType,
        var_code: impl Into<String>,
    ) -> Self {
        Self {
            canonical: canonical.into(),
            year,
            file_type,
            var_code: var_code.into(),
            label: String::new(),
            category: String::new(),
            dtype: None,
            required: true,
            transform: String::new(),
            line: 0,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn with_dtype(mut self, dtype: Option<ColumnDtype>) -> Self {
        self.dtype = dtype;
        self
    }

    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = transform.into();
        self
    }
}
