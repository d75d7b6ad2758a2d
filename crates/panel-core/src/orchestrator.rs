//! Fans year tasks out to workers and merges their results into one panel.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use panel_model::{
    AuditRow, Diagnostics, ExtractionOptions, Issue, MappingRow, PanelError, Result, Severity,
};
use polars::prelude::{Column, DataFrame, DataType, SortMultipleOptions};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, info_span, warn};

use crate::plan::{YearTask, plan_extraction};
use crate::worker::{YEAR_COLUMN, YearResult, frame_error, process_year};

/// Merged output of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    /// `year`, then index columns, then the other canonicals in name order;
    /// sorted by year and the index columns.
    pub panel: DataFrame,
    pub audit: Vec<AuditRow>,
    /// Issues in year order, planning issues first.
    pub issues: Vec<Issue>,
    pub canonicals: Vec<String>,
    /// Years that produced rows.
    pub years: Vec<i32>,
}

impl ExtractionRun {
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn summary(&self) -> RunSummary {
        let mut resolved_by_year = BTreeMap::new();
        for row in &self.audit {
            resolved_by_year.entry(row.year).or_insert((
                row.duplicate_canonicals_resolved,
                row.duplicate_canonicals_unresolved,
            ));
        }
        let audited: BTreeSet<i32> = self.audit.iter().map(|row| row.year).collect();
        let error_years: BTreeSet<i32> = self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .filter_map(|i| i.year)
            .collect();
        RunSummary {
            rows: self.panel.height(),
            columns: self.panel.width(),
            years: self.years.clone(),
            years_without_data: audited
                .union(&error_years)
                .copied()
                .filter(|year| !self.years.contains(year))
                .collect(),
            canonicals: self.canonicals.clone(),
            files: self.audit.len(),
            info: self.count(Severity::Info),
            warnings: self.count(Severity::Warning),
            errors: self.count(Severity::Error),
            duplicate_canonicals_resolved: resolved_by_year.values().map(|v| v.0).sum(),
            duplicate_canonicals_unresolved: resolved_by_year.values().map(|v| v.1).sum(),
        }
    }
}

/// Serializable digest of an [`ExtractionRun`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    pub columns: usize,
    pub years: Vec<i32>,
    pub years_without_data: Vec<i32>,
    pub canonicals: Vec<String>,
    pub files: usize,
    pub info: usize,
    pub warnings: usize,
    pub errors: usize,
    pub duplicate_canonicals_resolved: usize,
    pub duplicate_canonicals_unresolved: usize,
}

/// Runs every task and merges the results.
///
/// `workers` of 0 or 1 runs the tasks in order on the calling thread.
/// `on_year` is called as each year finishes, in completion order.
pub fn run_extraction<F>(tasks: &[YearTask], workers: usize, on_year: F) -> Result<ExtractionRun>
where
    F: Fn(&YearResult) + Sync,
{
    let span = info_span!("extract", tasks = tasks.len(), workers);
    let _guard = span.enter();

    let run_task = |task: &YearTask| -> Result<YearResult> {
        let result = process_year(task)?;
        on_year(&result);
        Ok(result)
    };
    let mut results: Vec<YearResult> = if workers <= 1 {
        tasks.iter().map(run_task).collect::<Result<_>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| PanelError::WorkerPool(e.to_string()))?;
        pool.install(|| tasks.par_iter().map(run_task).collect::<Result<_>>())?
    };
    results.sort_by_key(|result| result.year);
    let index_cols = tasks
        .first()
        .map_or(&[][..], |task| task.options.index_cols.as_slice());
    merge_results(results, index_cols)
}

/// Plans and runs an extraction in one call.
pub fn extract_panel(
    rows: &[MappingRow],
    files: &BTreeMap<i32, Vec<PathBuf>>,
    options: &ExtractionOptions,
    workers: usize,
) -> Result<ExtractionRun> {
    let mut diagnostics = Diagnostics::new(options.mode);
    let plan = plan_extraction(rows, files, options, &mut diagnostics)?;
    for issue in diagnostics.issues() {
        log_issue(issue);
    }
    let mut run = run_extraction(&plan.tasks, workers, |_| {})?;
    let mut issues = diagnostics.into_issues();
    issues.append(&mut run.issues);
    run.issues = issues;
    Ok(run)
}

fn merge_results(results: Vec<YearResult>, index_cols: &[String]) -> Result<ExtractionRun> {
    let mut audit = Vec::new();
    let mut issues = Vec::new();
    let mut frames = Vec::new();
    let mut canonicals: BTreeSet<String> = BTreeSet::new();
    let mut years = Vec::new();

    for result in results {
        for issue in &result.issues {
            log_issue(issue);
        }
        issues.extend(result.issues);
        audit.extend(result.audit);
        if let Some(frame) = result.frame {
            canonicals.extend(
                frame
                    .get_column_names()
                    .into_iter()
                    .filter(|name| name.as_str() != YEAR_COLUMN)
                    .map(|name| name.to_string()),
            );
            years.push(result.year);
            frames.push(frame);
        }
    }
    if frames.is_empty() {
        return Err(PanelError::EmptySelection(
            "no year produced data; aborting extraction".to_string(),
        ));
    }

    let canonicals: Vec<String> = canonicals.into_iter().collect();
    let mut aligned = align_frames(&frames, &canonicals)?.into_iter();
    let mut panel = aligned.next().unwrap_or_default();
    for frame in aligned {
        panel.vstack_mut(&frame).map_err(frame_error)?;
    }
    let panel = order_panel(&panel, &canonicals, index_cols)?;
    info!(
        rows = panel.height(),
        columns = panel.width(),
        years = years.len(),
        "panel assembled"
    );
    Ok(ExtractionRun {
        panel,
        audit,
        issues,
        canonicals,
        years,
    })
}

/// Sorts by `year` and the index columns present in the panel, moving those
/// columns to the front.
fn order_panel(panel: &DataFrame, canonicals: &[String], index_cols: &[String]) -> Result<DataFrame> {
    let mut keys = vec![YEAR_COLUMN.to_string()];
    for column in index_cols {
        if column == YEAR_COLUMN || keys.contains(column) {
            continue;
        }
        if canonicals.contains(column) {
            keys.push(column.clone());
        } else {
            warn!(column = %column, "index column not in panel, ignored");
        }
    }
    let sorted = panel
        .sort(
            keys.clone(),
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .map_err(frame_error)?;
    if keys.len() == 1 {
        return Ok(sorted);
    }
    let rest = canonicals.iter().filter(|canonical| !keys.contains(canonical));
    sorted
        .select(keys.iter().chain(rest).map(String::as_str))
        .map_err(frame_error)
}

/// Gives every frame the same columns and dtypes.
///
/// Missing canonicals become null columns. A canonical whose dtype differs
/// between years is stored as text.
fn align_frames(frames: &[DataFrame], canonicals: &[String]) -> Result<Vec<DataFrame>> {
    let mut targets: BTreeMap<&str, DataType> = BTreeMap::new();
    for canonical in canonicals {
        let mut target: Option<DataType> = None;
        for frame in frames {
            let Ok(column) = frame.column(canonical) else {
                continue;
            };
            let dtype = column.dtype();
            if dtype == &DataType::Null {
                continue;
            }
            match &target {
                None => target = Some(dtype.clone()),
                Some(existing) if existing != dtype => {
                    warn!(canonical = %canonical, "dtype differs between years, storing as text");
                    target = Some(DataType::String);
                    break;
                }
                Some(_) => {}
            }
        }
        targets.insert(canonical, target.unwrap_or(DataType::String));
    }

    frames
        .iter()
        .map(|frame| {
            let mut columns: Vec<Column> = Vec::with_capacity(canonicals.len() + 1);
            columns.push(frame.column(YEAR_COLUMN).map_err(frame_error)?.clone());
            for canonical in canonicals {
                let target = &targets[canonical.as_str()];
                let column = match frame.column(canonical) {
                    Ok(column) if column.dtype() == target => column.clone(),
                    Ok(column) => column.cast(target).map_err(frame_error)?,
                    Err(_) => Column::full_null(canonical.as_str().into(), frame.height(), target),
                };
                columns.push(column);
            }
            DataFrame::new(columns).map_err(frame_error)
        })
        .collect()
}

fn log_issue(issue: &Issue) {
    let canonical = issue.canonical.as_deref().unwrap_or_default();
    match issue.severity {
        Severity::Info => info!(year = ?issue.year, canonical, "{}", issue.message),
        Severity::Warning => warn!(year = ?issue.year, canonical, "{}", issue.message),
        Severity::Error => error!(year = ?issue.year, canonical, "{}", issue.message),
    }
}
