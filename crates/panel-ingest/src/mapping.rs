//! Mapping table loader.

use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use panel_model::{ColumnDtype, Diagnostics, FileType, MappingRow, PanelError, Result};
use tracing::{debug, info};

use crate::header::normalize_header;

/// Columns every mapping table must provide.
pub const MAPPING_COLUMNS: [&str; 9] = [
    "canonical",
    "year",
    "file_type",
    "var_code",
    "label",
    "category",
    "dtype",
    "required",
    "transform",
];

pub(crate) const MIN_YEAR: i32 = 1900;
pub(crate) const MAX_YEAR: i32 = 2099;

/// Reads the mapping CSV at `path`.
///
/// Row-level problems go through `diagnostics`: dropped rows become warnings in
/// permissive mode and abort in strict mode. A missing column always aborts.
pub fn read_mapping(path: &Path, diagnostics: &mut Diagnostics) -> Result<Vec<MappingRow>> {
    let file = std::fs::File::open(path).map_err(|e| PanelError::FileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let rows = parse_mapping(file, path, diagnostics)?;
    info!(path = %path.display(), rows = rows.len(), "loaded mapping");
    Ok(rows)
}

/// Parses mapping CSV text from any reader. `source` names it in errors.
pub fn parse_mapping<R: Read>(
    reader: R,
    source: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<MappingRow>> {
    let read_error = |e: csv::Error| PanelError::FileRead {
        path: source.to_path_buf(),
        message: e.to_string(),
    };
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .map_err(read_error)?
        .iter()
        .map(normalize_header)
        .collect();

    let missing: Vec<String> = MAPPING_COLUMNS
        .iter()
        .filter(|name| !headers.iter().any(|h| h == *name))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(PanelError::Schema { missing });
    }
    let index = |name: &str| headers.iter().position(|h| h == name).unwrap_or_default();
    let columns: Vec<usize> = MAPPING_COLUMNS.iter().map(|name| index(name)).collect();

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(read_error)?;
        // Header is line 1.
        let line = idx + 2;
        let field = |pos: usize| record.get(columns[pos]).unwrap_or("");

        let Some(year) = parse_year(field(1)) else {
            dropped += 1;
            diagnostics.report(PanelError::YearParse {
                value: field(1).trim().to_string(),
                line,
            })?;
            continue;
        };
        let Ok(file_type) = field(2).parse::<FileType>() else {
            dropped += 1;
            diagnostics.report(PanelError::InvalidField {
                field: "file_type",
                value: field(2).trim().to_string(),
                line,
            })?;
            continue;
        };
        let dtype = match clean(field(6)).to_lowercase().as_str() {
            "" => None,
            value => match value.parse::<ColumnDtype>() {
                Ok(dtype) => Some(dtype),
                Err(_) => {
                    diagnostics.report(PanelError::InvalidField {
                        field: "dtype",
                        value: value.to_string(),
                        line,
                    })?;
                    None
                }
            },
        };

        let mut row = MappingRow::new(
            clean(field(0)),
            year,
            file_type,
            normalize_header(field(3)),
        )
        .with_label(clean(field(4)))
        .with_category(clean(field(5)))
        .with_dtype(dtype)
        .with_required(parse_required(field(7)))
        .with_transform(clean(field(8)));
        row.line = line;
        rows.push(row);
    }
    debug!(rows = rows.len(), dropped, "parsed mapping rows");
    Ok(rows)
}

/// Trims a cell and treats the literal `nan` as blank.
fn clean(value: &str) -> String {
    let value = value.trim();
    if value.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        value.to_string()
    }
}

/// Accepts `1999` or `1999.0` inside the supported year window.
pub fn parse_year(value: &str) -> Option<i32> {
    let value = value.trim();
    let year = match value.parse::<i32>() {
        Ok(year) => year,
        Err(_) => {
            let float = value.parse::<f64>().ok()?;
            if !float.is_finite() || float.fract() != 0.0 {
                return None;
            }
            float as i32
        }
    };
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
}

/// Non-zero numbers, `true` and `yes` mark a row as required.
pub fn parse_required(value: &str) -> bool {
    let value = value.trim();
    if let Ok(number) = value.parse::<f64>() {
        return number != 0.0 && !number.is_nan();
    }
    matches!(value.to_lowercase().as_str(), "true" | "yes")
}
