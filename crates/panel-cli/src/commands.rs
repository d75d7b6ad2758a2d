//! Command implementations. Each returns an outcome for the summary printer.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use panel_core::{ExtractionRun, RunSummary, plan_extraction, run_extraction};
use panel_ingest::{MappingFilter, collect_labels, gather_files, parse_year_filter, read_mapping};
use panel_map::{
    GridMerge, GridOptions, GridReport, GridSelection, MappingDictionary, build_dictionary,
    build_grid, merge_grid_rows, select_grid_rows,
};
use panel_model::{Diagnostics, FileType, Issue, MappingRow, RunMode, Severity};
use tracing::{info, info_span, warn};

use crate::cli::{
    AllArgs, DictArgs, ExtractArgs, FilterGridArgs, GridArgs, MergeGridArgs, SourceArgs,
};
use crate::output::{
    AUDIT_FILE, DICTIONARY_LONG_FILE, DICTIONARY_WIDE_FILE, FINAL_GRID_FILE, GRID_CONFLICTS_FILE,
    GRID_COVERAGE_FILE, GRID_DICTIONARY_FILE, GRID_FILE, GRID_LEFTOVERS_FILE, GRID_RARITY_FILE,
    MESSAGES_FILE, PANEL_FILE, SUMMARY_FILE, ensure_dir, read_grid, write_frame, write_grid,
    write_json, write_messages, write_records, write_rows,
};

pub struct GridOutcome {
    pub report: GridReport,
    pub mapping_issues: Vec<Issue>,
    pub written: Vec<PathBuf>,
}

pub struct MergeOutcome {
    pub merge: GridMerge,
    pub written: Vec<PathBuf>,
}

pub struct FilterOutcome {
    /// Every grid concept, filled only for `--list`.
    pub listing: Vec<String>,
    pub selection: Option<GridSelection>,
    /// True when diagnostics went to a file rather than the console.
    pub diagnostics_written: bool,
    pub written: Vec<PathBuf>,
}

pub struct DictOutcome {
    pub dictionary: MappingDictionary,
    pub issues: Vec<Issue>,
    pub written: Vec<PathBuf>,
}

pub struct ExtractOutcome {
    pub run: ExtractionRun,
    pub summary: RunSummary,
    pub written: Vec<PathBuf>,
}

pub fn run_grid(args: &GridArgs) -> Result<GridOutcome> {
    let span = info_span!("grid", mapping = %args.mapping.display());
    let _guard = span.enter();
    let mut diagnostics = Diagnostics::new(RunMode::Permissive);
    let rows = load_mapping(&args.mapping, &mut diagnostics)?;
    let years = parse_year_filter(args.years.as_deref(), &mut diagnostics)?;
    let options = GridOptions::default()
        .with_preferred(args.prefer.into())
        .with_drop_imp(args.drop_imp)
        .with_years(years);

    let report = build_grid(&rows, &options);

    let out = &args.out_dir;
    ensure_dir(out)?;
    let written = vec![
        write_grid(&out.join(GRID_FILE), &report.grid)?,
        write_rows(&out.join(GRID_CONFLICTS_FILE), &report.conflicts)?,
        write_rows(&out.join(GRID_COVERAGE_FILE), &report.coverage)?,
        write_rows(&out.join(GRID_RARITY_FILE), &report.rarity)?,
        write_rows(&out.join(GRID_LEFTOVERS_FILE), &report.leftovers)?,
        write_rows(&out.join(GRID_DICTIONARY_FILE), &report.dictionary)?,
    ];
    info!(
        concepts = report.grid.rows.len(),
        dropped_imputed = report.dropped_imputed,
        "wrote grid outputs"
    );
    Ok(GridOutcome {
        report,
        mapping_issues: diagnostics.into_issues(),
        written,
    })
}

/// Parses `"4 19"` or `"4,19"` into row numbers.
pub fn parse_group(value: &str) -> Result<Vec<usize>> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<usize>()
                .with_context(|| format!("invalid row number '{token}' in group '{value}'"))
        })
        .collect()
}

pub fn run_merge_grid(args: &MergeGridArgs) -> Result<MergeOutcome> {
    let grid = read_grid(&args.file)?;
    let groups = args
        .groups
        .iter()
        .map(|group| parse_group(group))
        .collect::<Result<Vec<_>>>()?;
    let merge = merge_grid_rows(&grid, &groups);

    let out = args.out.clone().unwrap_or_else(|| merged_path(&args.file));
    let final_path = out
        .parent()
        .map_or_else(|| PathBuf::from(FINAL_GRID_FILE), |dir| dir.join(FINAL_GRID_FILE));
    if let Some(dir) = out.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        ensure_dir(dir)?;
    }
    let written = vec![
        write_grid(&out, &merge.merged)?,
        write_grid(&final_path, &merge.base_rows)?,
    ];
    Ok(MergeOutcome { merge, written })
}

fn merged_path(grid: &Path) -> PathBuf {
    let stem = grid
        .file_stem()
        .map_or_else(|| "canonical_grid".to_string(), |s| s.to_string_lossy().into_owned());
    grid.with_file_name(format!("{stem}_merged.csv"))
}

pub fn run_filter_grid(args: &FilterGridArgs) -> Result<FilterOutcome> {
    let grid = read_grid(&args.grid)?;
    if args.list {
        return Ok(FilterOutcome {
            listing: grid.rows.iter().map(|row| row.concept.clone()).collect(),
            selection: None,
            diagnostics_written: false,
            written: Vec::new(),
        });
    }

    let mut queries: Vec<String> = args
        .concepts
        .iter()
        .map(|query| query.trim().to_string())
        .filter(|query| !query.is_empty())
        .collect();
    if let Some(path) = &args.concepts_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read concepts file: {}", path.display()))?;
        queries.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    if queries.is_empty() {
        bail!("no concepts given; use --concept or --concepts-file");
    }

    let selection = select_grid_rows(&grid, &queries, &args.options());
    let mut written = Vec::new();
    if let Some(path) = &args.diagnostics {
        let mut text = selection.diagnostics.join("\n");
        text.push('\n');
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path.clone());
    }
    if selection.grid.rows.is_empty() {
        warn!(queries = queries.len(), "no grid rows matched; nothing written");
    } else {
        if let Some(dir) = args.out.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            ensure_dir(dir)?;
        }
        written.push(write_grid(&args.out, &selection.grid)?);
        written.push(write_records(
            &long_path(&args.out),
            &selection.long_header(),
            &selection.long_records(),
        )?);
        info!(rows = selection.grid.rows.len(), "wrote filtered grid");
    }
    Ok(FilterOutcome {
        listing: Vec::new(),
        selection: Some(selection),
        diagnostics_written: args.diagnostics.is_some(),
        written,
    })
}

fn long_path(grid: &Path) -> PathBuf {
    let stem = grid
        .file_stem()
        .map_or_else(|| "canonical_grid_study".to_string(), |s| s.to_string_lossy().into_owned());
    grid.with_file_name(format!("{stem}_long.csv"))
}

pub fn run_dict(args: &DictArgs) -> Result<DictOutcome> {
    let source = &args.source;
    let span = info_span!("dict", mapping = %source.mapping.display());
    let _guard = span.enter();
    let mut diagnostics = Diagnostics::new(source.mode());
    let rows = load_selected(source, &mut diagnostics)?;

    let wanted: BTreeSet<(FileType, i32, String)> = rows
        .iter()
        .map(|row| (row.file_type, row.year, row.var_code.clone()))
        .collect();
    let labels = collect_labels(&source.data_dir, Some(&wanted))?;
    let dictionary = build_dictionary(&rows, &labels);

    ensure_dir(&source.out_dir)?;
    let mut written = Vec::new();
    if !args.long_only {
        written.push(write_records(
            &source.out_dir.join(DICTIONARY_WIDE_FILE),
            &dictionary.wide_header(),
            &dictionary.wide_records(),
        )?);
    }
    if !args.wide_only {
        written.push(write_records(
            &source.out_dir.join(DICTIONARY_LONG_FILE),
            &dictionary.long_header(),
            &dictionary.long_records(),
        )?);
    }
    info!(
        labels = dictionary.entries.len(),
        unknown = dictionary.unknown_labels,
        "wrote dictionaries"
    );
    Ok(DictOutcome {
        dictionary,
        issues: diagnostics.into_issues(),
        written,
    })
}

pub fn run_extract(args: &ExtractArgs) -> Result<ExtractOutcome> {
    let source = &args.source;
    let options = args.options();
    let span = info_span!("extract", mapping = %source.mapping.display());
    let _guard = span.enter();

    let mut diagnostics = Diagnostics::new(options.mode);
    let rows = load_selected(source, &mut diagnostics)?;
    let years: BTreeSet<i32> = rows.iter().map(|row| row.year).collect();
    let modules: BTreeSet<FileType> = source.modules().into_iter().collect();
    let files = gather_files(&source.data_dir, &modules, Some(&years))?;
    let plan = plan_extraction(&rows, &files, &options, &mut diagnostics)?;

    let progress = ProgressBar::new(plan.tasks.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30.cyan/blue}] {pos}/{len} years {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let mut run = run_extraction(&plan.tasks, args.parallel, |result| {
        progress.set_message(result.year.to_string());
        progress.inc(1);
    })?;
    progress.finish_and_clear();

    let mut issues = diagnostics.into_issues();
    issues.append(&mut run.issues);
    run.issues = issues;
    let summary = run.summary();

    let out = &source.out_dir;
    ensure_dir(out)?;
    let written = vec![
        write_frame(&out.join(PANEL_FILE), &mut run.panel)?,
        write_rows(&out.join(AUDIT_FILE), &run.audit)?,
        write_messages(&out.join(MESSAGES_FILE), &run.issues)?,
        write_json(&out.join(SUMMARY_FILE), &summary)?,
    ];
    info!(
        rows = summary.rows,
        canonicals = summary.canonicals.len(),
        years = ?summary.years,
        "wrote panel outputs"
    );
    Ok(ExtractOutcome {
        run,
        summary,
        written,
    })
}

pub fn run_all(args: &AllArgs) -> Result<(DictOutcome, ExtractOutcome)> {
    let dict = run_dict(&DictArgs {
        source: args.extract.source.clone(),
        wide_only: false,
        long_only: false,
    })?;
    let extract = run_extract(&args.extract)?;
    Ok((dict, extract))
}

fn load_mapping(path: &Path, diagnostics: &mut Diagnostics) -> Result<Vec<MappingRow>> {
    read_mapping(path, diagnostics)
        .with_context(|| format!("Failed to load mapping: {}", path.display()))
}

/// Loads the mapping and applies the year and module filters.
fn load_selected(source: &SourceArgs, diagnostics: &mut Diagnostics) -> Result<Vec<MappingRow>> {
    let rows = load_mapping(&source.mapping, diagnostics)?;
    let years = parse_year_filter(source.years.as_deref(), diagnostics)?;
    let filter = MappingFilter::default()
        .with_years(years)
        .with_modules(source.modules());
    let rows = filter.apply(rows)?;
    let warnings = diagnostics
        .issues()
        .iter()
        .filter(|issue| issue.severity == Severity::Warning)
        .count();
    info!(rows = rows.len(), warnings, "selected mapping rows");
    Ok(rows)
}
