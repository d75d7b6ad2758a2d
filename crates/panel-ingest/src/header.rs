//! Header probing for source CSV files.

use std::collections::BTreeMap;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::{IngestError, Result};

/// Header row of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvHeader {
    /// Names as written in the file (BOM removed).
    pub raw: Vec<String>,
    /// Normalized variable codes, aligned with `raw`.
    pub columns: Vec<String>,
}

impl CsvHeader {
    pub fn from_raw(raw: Vec<String>) -> Self {
        let raw: Vec<String> = raw
            .into_iter()
            .map(|name| name.trim_start_matches('\u{feff}').to_string())
            .collect();
        let columns = raw.iter().map(|name| normalize_header(name)).collect();
        Self { raw, columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Name as written in the file for a normalized column.
    pub fn raw_name(&self, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.raw.get(idx).map(String::as_str)
    }
}

/// Normalizes a variable code: trims whitespace and a leading BOM.
pub fn normalize_header(value: &str) -> String {
    value.trim_start_matches('\u{feff}').trim().to_string()
}

/// Reads only the header row of `path`.
pub fn read_header(path: &Path) -> Result<CsvHeader> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| IngestError::csv(path, &e))?;
    let mut record = csv::StringRecord::new();
    let found = reader
        .read_record(&mut record)
        .map_err(|e| IngestError::csv(path, &e))?;
    if !found {
        return Err(IngestError::EmptyCsv {
            path: path.to_path_buf(),
        });
    }
    Ok(CsvHeader::from_raw(record.iter().map(str::to_string).collect()))
}

/// Reads the label row (first row after the header) keyed by normalized code.
///
/// Returns `None` when the file has a header but no further rows.
pub fn read_label_row(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| IngestError::csv(path, &e))?;
    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => CsvHeader::from_raw(
            record
                .map_err(|e| IngestError::csv(path, &e))?
                .iter()
                .map(str::to_string)
                .collect(),
        ),
        None => {
            return Err(IngestError::EmptyCsv {
                path: path.to_path_buf(),
            });
        }
    };
    let Some(labels) = records.next() else {
        return Ok(None);
    };
    let labels = labels.map_err(|e| IngestError::csv(path, &e))?;
    let mut out = BTreeMap::new();
    for (column, label) in header.columns.iter().zip(labels.iter()) {
        let label = label.trim();
        let slot = out.entry(column.clone()).or_insert_with(String::new);
        if slot.is_empty() && !label.is_empty() {
            *slot = label.to_string();
        }
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("\u{feff} ER1 "), "ER1");
        assert_eq!(normalize_header("S1"), "S1");
    }

    #[test]
    fn test_read_header_and_labels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FAM1999.csv");
        std::fs::write(&path, "\u{feff}ER1, ER2 \nTotal income,Age of head\n10,40\n")
            .unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.columns, vec!["ER1", "ER2"]);
        assert_eq!(header.raw_name("ER2"), Some(" ER2 "));
        assert!(header.contains("ER1"));

        let labels = read_label_row(&path).unwrap().unwrap();
        assert_eq!(labels.get("ER2").map(String::as_str), Some("Age of head"));
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("WLTH2001.csv");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(read_header(&path), Err(IngestError::EmptyCsv { .. })));
        assert!(matches!(
            read_header(&dir.path().join("missing.csv")),
            Err(IngestError::FileNotFound { .. })
        ));
    }
}
