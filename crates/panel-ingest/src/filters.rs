//! Year and module selection over mapping rows.

use std::collections::BTreeSet;

use panel_model::{Diagnostics, FileType, MappingRow, PanelError, Result};

use crate::mapping::{MAX_YEAR, MIN_YEAR};

/// Parses `1999,2001-2005` into a year set.
///
/// Returns `None` when no filter was given. Reversed ranges are swapped and
/// ranges are clipped to the supported year window. Invalid tokens and tokens
/// wholly outside the window are reported and skipped.
pub fn parse_year_filter(
    value: Option<&str>,
    diagnostics: &mut Diagnostics,
) -> Result<Option<BTreeSet<i32>>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let mut years = BTreeSet::new();
    for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let range = parse_token(token).and_then(|(start, end)| {
            let low = start.min(end).max(MIN_YEAR);
            let high = start.max(end).min(MAX_YEAR);
            (low <= high).then_some(low..=high)
        });
        match range {
            Some(range) => years.extend(range),
            None => diagnostics.report(PanelError::YearFilter {
                token: token.to_string(),
            })?,
        }
    }
    Ok(Some(years))
}

fn parse_token(token: &str) -> Option<(i32, i32)> {
    match token.split_once('-') {
        Some((start, end)) => Some((start.trim().parse().ok()?, end.trim().parse().ok()?)),
        None => {
            let year = token.parse().ok()?;
            Some((year, year))
        }
    }
}

/// Row selection applied after loading the mapping.
#[derive(Debug, Clone, Default)]
pub struct MappingFilter {
    pub years: Option<BTreeSet<i32>>,
    pub modules: Option<BTreeSet<FileType>>,
}

impl MappingFilter {
    #[must_use]
    pub fn with_years(mut self, years: Option<BTreeSet<i32>>) -> Self {
        self.years = years;
        self
    }

    #[must_use]
    pub fn with_modules(mut self, modules: impl IntoIterator<Item = FileType>) -> Self {
        let modules: BTreeSet<FileType> = modules.into_iter().collect();
        self.modules = (!modules.is_empty()).then_some(modules);
        self
    }

    pub fn accepts(&self, row: &MappingRow) -> bool {
        self.years.as_ref().is_none_or(|y| y.contains(&row.year))
            && self
                .modules
                .as_ref()
                .is_none_or(|m| m.contains(&row.file_type))
    }

    /// Keeps matching rows; selecting nothing is an error.
    pub fn apply(&self, rows: Vec<MappingRow>) -> Result<Vec<MappingRow>> {
        let total = rows.len();
        let kept: Vec<MappingRow> = rows.into_iter().filter(|row| self.accepts(row)).collect();
        if kept.is_empty() {
            return Err(PanelError::EmptySelection(format!(
                "no mapping rows left after filtering ({total} rows before filters)"
            )));
        }
        Ok(kept)
    }
}
