//! Canonical-level metadata aggregated from mapping rows.

use std::collections::BTreeMap;

use panel_model::{ColumnDtype, Diagnostics, FileType, MappingRow, PanelError, Result};
use panel_transform::{TransformSpec, parse_transform};
use serde::Serialize;

/// Everything extraction needs to know about one canonical.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalMeta {
    pub canonical: String,
    pub dtype: Option<ColumnDtype>,
    pub transform: TransformSpec,
    pub label: String,
    pub category: String,
    pub file_type: FileType,
}

impl CanonicalMeta {
    fn new(row: &MappingRow) -> Self {
        Self {
            canonical: row.canonical.clone(),
            dtype: None,
            transform: TransformSpec::default(),
            label: String::new(),
            category: String::new(),
            file_type: row.file_type,
        }
    }
}

/// Metadata for every canonical, ordered by name.
pub type CanonicalMetadata = BTreeMap<String, CanonicalMeta>;

/// Folds all rows sharing a canonical into one [`CanonicalMeta`].
///
/// Rows are visited in mapping order, so the first declared dtype and the
/// first duplicate strategy win. Later conflicting values are reported.
pub fn build_canonical_metadata(
    rows: &[MappingRow],
    diagnostics: &mut Diagnostics,
) -> Result<CanonicalMetadata> {
    let mut metadata = CanonicalMetadata::new();
    for row in rows.iter().filter(|row| !row.canonical.is_empty()) {
        let meta = metadata
            .entry(row.canonical.clone())
            .or_insert_with(|| CanonicalMeta::new(row));

        if let Some(dtype) = row.dtype {
            match meta.dtype {
                None => meta.dtype = Some(dtype),
                Some(kept) if kept != dtype => diagnostics.report(PanelError::MetadataConflict {
                    canonical: row.canonical.clone(),
                    message: format!("conflicting dtype {dtype} on line {}; using {kept}", row.line),
                })?,
                Some(_) => {}
            }
        }
        if meta.label.is_empty() && !row.label.is_empty() {
            meta.label.clone_from(&row.label);
        }
        if meta.category.is_empty() && !row.category.is_empty() {
            meta.category.clone_from(&row.category);
        }

        let spec = parse_transform(&row.transform, &row.canonical, diagnostics)?;
        if let Some(conflict) = meta.transform.merge(&spec) {
            diagnostics.report(PanelError::MetadataConflict {
                canonical: row.canonical.clone(),
                message: format!(
                    "duplicate strategy {} ignored; keeping {}",
                    conflict.ignored, conflict.kept
                ),
            })?;
        }
    }
    tracing::debug!(canonicals = metadata.len(), "built canonical metadata");
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::{RunMode, Severity};
    use panel_transform::{DuplicateStrategy, TransformOperation};

    fn row(year: i32, code: &str) -> MappingRow {
        MappingRow::new("income", year, FileType::Fam, code)
    }

    #[test]
    fn test_first_values_win() {
        let rows = vec![
            row(1999, "ER1").with_transform("na_codes:[9999]"),
            row(2001, "ER2")
                .with_label("Total income")
                .with_category("Income")
                .with_dtype(Some(ColumnDtype::Float64))
                .with_transform("sum_non_na; na_codes:[9999]; clip:[0,]"),
        ];
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let metadata = build_canonical_metadata(&rows, &mut diagnostics).unwrap();

        let meta = &metadata["income"];
        assert_eq!(meta.dtype, Some(ColumnDtype::Float64));
        assert_eq!(meta.label, "Total income");
        assert_eq!(meta.category, "Income");
        assert_eq!(meta.transform.duplicate_strategy, Some(DuplicateStrategy::SumNonNa));
        assert_eq!(meta.transform.operations.len(), 2);
        assert!(matches!(meta.transform.operations[0], TransformOperation::NaCodes { .. }));
        assert!(diagnostics.issues().is_empty());
    }

    #[test]
    fn test_conflicts_are_reported() {
        let rows = vec![
            row(1999, "ER1")
                .with_dtype(Some(ColumnDtype::Int64))
                .with_transform("first_non_na"),
            row(2001, "ER2")
                .with_dtype(Some(ColumnDtype::String))
                .with_transform("max_non_na"),
        ];
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let metadata = build_canonical_metadata(&rows, &mut diagnostics).unwrap();
        let meta = &metadata["income"];
        assert_eq!(meta.dtype, Some(ColumnDtype::Int64));
        assert_eq!(meta.transform.duplicate_strategy, Some(DuplicateStrategy::FirstNonNa));

        let issues = diagnostics.issues();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
        assert!(issues.iter().all(|i| i.canonical.as_deref() == Some("income")));

        let mut strict = Diagnostics::new(RunMode::Strict);
        assert!(matches!(
            build_canonical_metadata(&rows, &mut strict),
            Err(PanelError::MetadataConflict { .. })
        ));
    }
}
