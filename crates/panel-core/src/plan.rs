//! Splits a mapping into independent per-year extraction tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use panel_model::{Diagnostics, ExtractionOptions, MappingRow, PanelError, Result};

use crate::metadata::{CanonicalMetadata, build_canonical_metadata};

/// Immutable work unit for one year.
#[derive(Debug, Clone)]
pub struct YearTask {
    pub year: i32,
    /// Source files in listing order.
    pub files: Vec<PathBuf>,
    /// Source codes per canonical, in mapping order.
    pub var_codes: BTreeMap<String, Vec<String>>,
    /// Owning canonical per source code.
    pub var_code_owner: BTreeMap<String, String>,
    pub metadata: Arc<CanonicalMetadata>,
    pub options: ExtractionOptions,
}

impl YearTask {
    /// Every source code the year needs, first-seen order.
    pub fn wanted_codes(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.var_codes
            .values()
            .flatten()
            .filter(|code| seen.insert(code.as_str()))
            .cloned()
            .collect()
    }

    /// Canonicals (across all years) extracted into every year's frame.
    pub fn canonicals(&self) -> impl Iterator<Item = &str> {
        self.metadata.keys().map(String::as_str)
    }
}

/// Tasks plus the metadata they share.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub tasks: Vec<YearTask>,
    pub metadata: Arc<CanonicalMetadata>,
}

impl ExtractionPlan {
    pub fn years(&self) -> Vec<i32> {
        self.tasks.iter().map(|task| task.year).collect()
    }
}

/// Builds one task per mapping year from the `required` rows.
///
/// Years without data files still get a task so the worker can record them.
/// At least one year must have files.
pub fn plan_extraction(
    rows: &[MappingRow],
    files: &BTreeMap<i32, Vec<PathBuf>>,
    options: &ExtractionOptions,
    diagnostics: &mut Diagnostics,
) -> Result<ExtractionPlan> {
    let required: Vec<MappingRow> = rows
        .iter()
        .filter(|row| row.required && !row.canonical.is_empty() && !row.var_code.is_empty())
        .cloned()
        .collect();
    if required.is_empty() {
        return Err(PanelError::EmptySelection(
            "no required mapping rows after filtering".to_string(),
        ));
    }
    let metadata = Arc::new(build_canonical_metadata(&required, diagnostics)?);

    let mut by_year: BTreeMap<i32, Vec<&MappingRow>> = BTreeMap::new();
    for row in &required {
        by_year.entry(row.year).or_default().push(row);
    }
    if !by_year.keys().any(|year| files.contains_key(year)) {
        return Err(PanelError::EmptySelection(
            "no overlapping years between mapping and data files".to_string(),
        ));
    }

    let mut tasks = Vec::with_capacity(by_year.len());
    for (year, year_rows) in by_year {
        let mut year_diagnostics = Diagnostics::for_year(diagnostics.mode(), year);
        let mut var_codes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut var_code_owner: BTreeMap<String, String> = BTreeMap::new();
        for row in year_rows {
            let codes = var_codes.entry(row.canonical.clone()).or_default();
            if !codes.contains(&row.var_code) {
                codes.push(row.var_code.clone());
            }
            match var_code_owner.get(&row.var_code) {
                Some(owner) if owner != &row.canonical => {
                    year_diagnostics.report(PanelError::VarCodeConflict {
                        var_code: row.var_code.clone(),
                        year,
                        first: owner.clone(),
                        second: row.canonical.clone(),
                    })?;
                }
                Some(_) => {}
                None => {
                    var_code_owner.insert(row.var_code.clone(), row.canonical.clone());
                }
            }
        }
        diagnostics.extend(year_diagnostics.into_issues());
        tasks.push(YearTask {
            year,
            files: files.get(&year).cloned().unwrap_or_default(),
            var_codes,
            var_code_owner,
            metadata: Arc::clone(&metadata),
            options: options.clone(),
        });
    }
    tracing::info!(
        tasks = tasks.len(),
        canonicals = metadata.len(),
        "planned extraction"
    );
    Ok(ExtractionPlan { tasks, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::{FileType, RunMode};

    fn files(years: &[i32]) -> BTreeMap<i32, Vec<PathBuf>> {
        years
            .iter()
            .map(|year| (*year, vec![PathBuf::from(format!("FAM{year}.csv"))]))
            .collect()
    }

    #[test]
    fn test_plan_per_year() {
        let rows = vec![
            MappingRow::new("income", 1999, FileType::Fam, "ER1"),
            MappingRow::new("income", 1999, FileType::Fam, "ER9"),
            MappingRow::new("wealth", 1999, FileType::Wlth, "S1"),
            MappingRow::new("income", 2001, FileType::Fam, "ER1"),
            MappingRow::new("kids", 2001, FileType::Fam, "ER5").with_required(false),
        ];
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let plan = plan_extraction(
            &rows,
            &files(&[1999, 2001, 2003]),
            &ExtractionOptions::default(),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(plan.years(), vec![1999, 2001]);
        assert_eq!(plan.metadata.keys().collect::<Vec<_>>(), vec!["income", "wealth"]);
        let first = &plan.tasks[0];
        assert_eq!(first.var_codes["income"], vec!["ER1", "ER9"]);
        assert_eq!(first.wanted_codes(), vec!["ER1", "ER9", "S1"]);
        assert_eq!(first.var_code_owner["S1"], "wealth");
        assert!(diagnostics.issues().is_empty());
    }

    #[test]
    fn test_year_without_files_still_planned() {
        let rows = vec![
            MappingRow::new("income", 1999, FileType::Fam, "ER1"),
            MappingRow::new("income", 2001, FileType::Fam, "ER1"),
        ];
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let plan = plan_extraction(
            &rows,
            &files(&[1999]),
            &ExtractionOptions::default(),
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(plan.years(), vec![1999, 2001]);
        assert!(plan.tasks[1].files.is_empty());

        let err = plan_extraction(
            &rows,
            &files(&[2005]),
            &ExtractionOptions::default(),
            &mut diagnostics,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no overlapping years"));
    }

    #[test]
    fn test_var_code_conflict() {
        let rows = vec![
            MappingRow::new("income", 1999, FileType::Fam, "ER1"),
            MappingRow::new("earnings", 1999, FileType::Fam, "ER1"),
        ];
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let plan = plan_extraction(
            &rows,
            &files(&[1999]),
            &ExtractionOptions::default(),
            &mut diagnostics,
        )
        .unwrap();
        let task = &plan.tasks[0];
        assert_eq!(task.var_code_owner["ER1"], "income");
        assert_eq!(task.var_codes["earnings"], vec!["ER1"]);
        assert_eq!(diagnostics.issues().len(), 1);
        assert_eq!(diagnostics.issues()[0].year, Some(1999));

        let mut strict = Diagnostics::new(RunMode::Strict);
        let result = plan_extraction(
            &rows,
            &files(&[1999]),
            &ExtractionOptions::default(),
            &mut strict,
        );
        assert!(matches!(result, Err(PanelError::VarCodeConflict { .. })));
    }
}
