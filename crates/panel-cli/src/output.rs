//! Report and panel writers.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use panel_map::ConceptGrid;
use panel_model::{Issue, Severity};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use serde::Serialize;

pub const GRID_FILE: &str = "canonical_grid.csv";
pub const GRID_CONFLICTS_FILE: &str = "canonical_grid_conflicts.csv";
pub const GRID_COVERAGE_FILE: &str = "canonical_grid_coverage.csv";
pub const GRID_RARITY_FILE: &str = "canonical_grid_rarity.csv";
pub const GRID_LEFTOVERS_FILE: &str = "canonical_grid_leftovers.csv";
pub const GRID_DICTIONARY_FILE: &str = "canonical_dictionary.csv";
pub const FINAL_GRID_FILE: &str = "final_grid.csv";
pub const DICTIONARY_WIDE_FILE: &str = "mapping_dictionary_wide.csv";
pub const DICTIONARY_LONG_FILE: &str = "mapping_dictionary_long.csv";
pub const PANEL_FILE: &str = "panel_required_only.csv";
pub const AUDIT_FILE: &str = "panel_extract_log.csv";
pub const MESSAGES_FILE: &str = "panel_extract_messages.csv";
pub const SUMMARY_FILE: &str = "panel_extract_summary.json";

pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}

/// Writes a header and string records.
pub fn write_records(path: &Path, header: &[String], records: &[Vec<String>]) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(header)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

/// Writes serde rows; the header comes from the field names.
///
/// An empty slice still produces a file so reruns never leave stale reports.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

pub fn write_grid(path: &Path, grid: &ConceptGrid) -> Result<PathBuf> {
    write_records(path, &grid.header(), &grid.records())
}

pub fn read_grid(path: &Path) -> Result<ConceptGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open grid: {}", path.display()))?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let records = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect::<Vec<_>>()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read grid: {}", path.display()))?;
    ConceptGrid::from_records(&header, &records)
        .with_context(|| format!("Failed to read grid: {}", path.display()))
}

pub fn write_frame(path: &Path, frame: &mut DataFrame) -> Result<PathBuf> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

#[derive(Serialize)]
struct MessageRow<'a> {
    year: Option<i32>,
    canonical: &'a str,
    severity: Severity,
    message: &'a str,
}

pub fn write_messages(path: &Path, issues: &[Issue]) -> Result<PathBuf> {
    let rows: Vec<MessageRow<'_>> = issues
        .iter()
        .map(|issue| MessageRow {
            year: issue.year,
            canonical: issue.canonical.as_deref().unwrap_or_default(),
            severity: issue.severity,
            message: &issue.message,
        })
        .collect();
    write_rows(path, &rows)
}
