//! Per-year extraction worker.

use std::collections::BTreeSet;
use std::path::Path;

use panel_ingest::{load_columns, read_header};
use panel_model::{AuditRow, Diagnostics, Issue, PanelError, Result};
use panel_transform::{ColumnValues, apply_operations, coerce_dtype, resolve_duplicates};
use polars::prelude::{Column, DataFrame, PolarsError};
use tracing::{debug, info_span};

use crate::plan::YearTask;

/// Name of the leading panel column.
pub const YEAR_COLUMN: &str = "year";

/// Everything a worker hands back for one year.
#[derive(Debug, Clone)]
pub struct YearResult {
    pub year: i32,
    /// `None` when no file of the year could be used.
    pub frame: Option<DataFrame>,
    pub issues: Vec<Issue>,
    pub audit: Vec<AuditRow>,
}

pub(crate) fn frame_error(error: PolarsError) -> PanelError {
    PanelError::Frame(error.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extracts one year's frame.
///
/// Unreadable files are skipped with a warning. Only strict-mode conditions
/// return an error.
pub fn process_year(task: &YearTask) -> Result<YearResult> {
    let span = info_span!("year", year = task.year, files = task.files.len());
    let _guard = span.enter();
    let mut diagnostics = Diagnostics::for_year(task.options.mode, task.year);

    let wanted = task.wanted_codes();
    let mut claimed: BTreeSet<String> = BTreeSet::new();
    let mut frames: Vec<DataFrame> = Vec::new();
    let mut audit: Vec<AuditRow> = Vec::new();

    for path in &task.files {
        let mut row = AuditRow::new(task.year, file_name(path));
        match claim_file(task, path, &wanted, &mut claimed, &mut diagnostics) {
            Some(frame) => {
                row.present_cols = frame.width();
                frames.push(frame);
            }
            None => row.present_cols = 0,
        }
        audit.push(row);
    }
    let missing_required = missing_canonicals(task, &claimed);
    for row in &mut audit {
        row.missing_required = missing_required;
    }

    if frames.is_empty() {
        let message = if task.files.is_empty() {
            format!("No files found for year {}", task.year)
        } else {
            format!("No usable files for year {}", task.year)
        };
        diagnostics.push(Issue::error(message));
        return Ok(YearResult {
            year: task.year,
            frame: None,
            issues: diagnostics.into_issues(),
            audit,
        });
    }

    let combined = combine_frames(frames)?;
    let height = combined.height();
    let mut columns: Vec<Column> = Vec::new();
    columns.push(Column::new(YEAR_COLUMN.into(), vec![task.year; height]));
    let mut resolved = 0;
    let mut unresolved = 0;

    for canonical in task.canonicals() {
        let sources: Vec<Column> = task
            .var_codes
            .get(canonical)
            .into_iter()
            .flatten()
            .filter(|code| claimed.contains(*code))
            .filter_map(|code| combined.column(code).ok().cloned())
            .collect();
        let strategy = task
            .metadata
            .get(canonical)
            .and_then(|meta| meta.transform.duplicate_strategy);
        let resolution = resolve_duplicates(
            canonical,
            task.year,
            &sources,
            strategy,
            &task.options,
            height,
            &mut diagnostics,
        )?;
        resolved += resolution.resolved;
        unresolved += resolution.unresolved;
        columns.push(finish_column(task, canonical, resolution.column, &mut diagnostics)?);
    }

    for row in &mut audit {
        row.duplicate_canonicals_resolved = resolved;
        row.duplicate_canonicals_unresolved = unresolved;
    }
    let frame = DataFrame::new(columns).map_err(frame_error)?;
    debug!(rows = height, columns = frame.width(), "year frame assembled");
    diagnostics.info(format!(
        "Processed year {} with {} rows",
        task.year,
        frame.height()
    ));
    Ok(YearResult {
        year: task.year,
        frame: Some(frame),
        issues: diagnostics.into_issues(),
        audit,
    })
}

/// Reads the columns `path` contributes that no earlier file claimed.
fn claim_file(
    task: &YearTask,
    path: &Path,
    wanted: &[String],
    claimed: &mut BTreeSet<String>,
    diagnostics: &mut Diagnostics,
) -> Option<DataFrame> {
    let name = file_name(path);
    let header = match read_header(path) {
        Ok(header) => header,
        Err(err) => {
            diagnostics.warning(format!("Failed to read header for {name}: {err}"));
            return None;
        }
    };

    let already: Vec<&str> = header
        .columns
        .iter()
        .filter(|column| claimed.contains(*column) && task.var_code_owner.contains_key(*column))
        .map(String::as_str)
        .collect();
    if !already.is_empty() {
        diagnostics.warning(format!(
            "Year {} file {name} contains already assigned columns: {}",
            task.year,
            already.join(", ")
        ));
    }

    let available: Vec<String> = wanted
        .iter()
        .filter(|code| !claimed.contains(*code) && header.contains(code))
        .cloned()
        .collect();
    if available.is_empty() {
        return None;
    }

    match load_columns(path, &header, &available, task.options.sample_rows) {
        Ok(load) => {
            if !load.label_row_skipped {
                debug!(file = %name, "read without label row");
            }
            claimed.extend(available);
            Some(load.frame)
        }
        Err(err) => {
            diagnostics.warning(format!("Failed to read {name}: {err}"));
            None
        }
    }
}

/// Required canonicals with no claimed source column, including those not
/// mapped in this year at all.
fn missing_canonicals(task: &YearTask, claimed: &BTreeSet<String>) -> usize {
    task.canonicals()
        .filter(|canonical| {
            task.var_codes
                .get(*canonical)
                .is_none_or(|codes| !codes.iter().any(|code| claimed.contains(code)))
        })
        .count()
}

/// Joins per-file frames side by side, padding shorter ones with missing rows.
fn combine_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let height = frames.iter().map(DataFrame::height).max().unwrap_or(0);
    let mut columns = Vec::new();
    for frame in frames {
        for column in frame.get_columns() {
            if column.len() == height {
                columns.push(column.clone());
            } else {
                let mut values = ColumnValues::from_column(column)?;
                values.pad_to(height);
                columns.push(values.into_column(column.name().as_str()));
            }
        }
    }
    DataFrame::new(columns).map_err(frame_error)
}

/// Applies dtype coercion and transforms according to the run options.
fn finish_column(
    task: &YearTask,
    canonical: &str,
    mut column: Column,
    diagnostics: &mut Diagnostics,
) -> Result<Column> {
    let Some(meta) = task.metadata.get(canonical) else {
        return Ok(column);
    };
    if task.options.coerce_types {
        if let Some(dtype) = meta.dtype {
            match coerce_dtype(&column, dtype, canonical) {
                Ok(coerced) => column = coerced,
                Err(err) => diagnostics.report(err)?,
            }
        }
    }
    if task.options.apply_transforms && !meta.transform.operations.is_empty() {
        column = apply_operations(&column, &meta.transform.operations)?;
    }
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use panel_model::{ExtractionOptions, Severity};

    use crate::metadata::CanonicalMetadata;

    #[test]
    fn test_combine_pads_shorter_frames() {
        let left = DataFrame::new(vec![Column::new("ER1".into(), vec![Some("1"), Some("2")])])
            .unwrap();
        let right = DataFrame::new(vec![Column::new("S1".into(), vec![Some("9")])]).unwrap();

        let combined = combine_frames(vec![left, right]).unwrap();
        assert_eq!(combined.height(), 2);
        let padded: Vec<Option<&str>> = combined
            .column("S1")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(padded, vec![Some("9"), None]);
    }

    #[test]
    fn test_year_without_files_yields_error_issue() {
        let task = YearTask {
            year: 2003,
            files: Vec::new(),
            var_codes: Default::default(),
            var_code_owner: Default::default(),
            metadata: Arc::new(CanonicalMetadata::new()),
            options: ExtractionOptions::default(),
        };
        let result = process_year(&task).unwrap();
        assert!(result.frame.is_none());
        assert!(result.audit.is_empty());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Error);
        assert_eq!(result.issues[0].year, Some(2003));
    }
}
