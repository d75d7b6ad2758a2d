//! Column loading for source files.

use std::path::Path;
use std::sync::Arc;

use polars::prelude::{CsvReadOptions, DataFrame, PlSmallStr, SerReader};

use crate::error::{IngestError, Result};
use crate::header::CsvHeader;

/// Frame read from one source file.
#[derive(Debug, Clone)]
pub struct ColumnLoad {
    /// Requested columns under their normalized names, all `String`.
    pub frame: DataFrame,
    /// False when the file had no label row and was re-read from its first row.
    pub label_row_skipped: bool,
}

/// Reads only `columns` (normalized codes) from `path`.
///
/// The first data row is a label row and is skipped. When that leaves no rows,
/// the file is read once more without the skip.
pub fn load_columns(
    path: &Path,
    header: &CsvHeader,
    columns: &[String],
    sample_rows: Option<usize>,
) -> Result<ColumnLoad> {
    let selected: Vec<(&str, &str)> = columns
        .iter()
        .filter_map(|column| header.raw_name(column).map(|raw| (raw, column.as_str())))
        .collect();

    let mut frame = read_frame(path, &selected, 1, sample_rows)?;
    let mut label_row_skipped = true;
    if frame.height() == 0 {
        tracing::debug!(path = %path.display(), "no rows after label row, re-reading");
        frame = read_frame(path, &selected, 0, sample_rows)?;
        label_row_skipped = false;
    }

    for (raw, column) in &selected {
        if raw != column {
            frame.rename(raw, (*column).into())?;
        }
    }
    let frame = frame.select(selected.iter().map(|(_, column)| *column))?;
    Ok(ColumnLoad {
        frame,
        label_row_skipped,
    })
}

fn read_frame(
    path: &Path,
    selected: &[(&str, &str)],
    skip_after_header: usize,
    sample_rows: Option<usize>,
) -> Result<DataFrame> {
    let projection: Arc<[PlSmallStr]> = selected.iter().map(|(raw, _)| (*raw).into()).collect();
    let parse_error = |e: polars::prelude::PolarsError| IngestError::CsvParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    CsvReadOptions::default()
        .with_has_header(true)
        .with_columns(Some(projection))
        .with_infer_schema_length(Some(0))
        .with_skip_rows_after_header(skip_after_header)
        .with_n_rows(sample_rows)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(parse_error)?
        .finish()
        .map_err(parse_error)
}
