use std::collections::BTreeMap;
use std::path::PathBuf;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use panel_model::{Issue, Severity};

use crate::commands::{DictOutcome, ExtractOutcome, FilterOutcome, GridOutcome, MergeOutcome};

pub fn print_grid_summary(outcome: &GridOutcome) {
    let report = &outcome.report;
    println!(
        "Concepts: {} across {} years",
        report.grid.rows.len(),
        report.grid.years.len()
    );
    let mut table = Table::new();
    table.set_header(vec![header_cell("Year"), header_cell("Concepts")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for coverage in &report.coverage {
        table.add_row(vec![Cell::new(coverage.year), Cell::new(coverage.n_concepts)]);
    }
    println!("{table}");
    println!(
        "Conflicts: {}  Rare concepts: {}  Leftovers: {}  Dropped IMP rows: {}",
        report.conflicts.len(),
        report.rarity.len(),
        report.leftovers.len(),
        report.dropped_imputed
    );
    print_issue_counts(&outcome.mapping_issues);
    print_written(&outcome.written);
}

pub fn print_merge_summary(outcome: &MergeOutcome) {
    println!(
        "Merged {} base rows, {} cells changed, {} warnings",
        outcome.merge.base_rows.rows.len(),
        outcome.merge.changed_cells,
        outcome.merge.warnings.len()
    );
    print_written(&outcome.written);
}

pub fn print_filter_summary(outcome: &FilterOutcome) {
    for concept in &outcome.listing {
        println!("{concept}");
    }
    let Some(selection) = &outcome.selection else {
        return;
    };
    if !outcome.diagnostics_written {
        for line in &selection.diagnostics {
            println!("{line}");
        }
    }
    println!(
        "Selected {} rows across {} years",
        selection.grid.rows.len(),
        selection.grid.years.len()
    );
    if !selection.missing.is_empty() {
        println!("No match for: {}", selection.missing.join(", "));
    }
    print_written(&outcome.written);
}

pub fn print_dict_summary(outcome: &DictOutcome) {
    println!(
        "Labels: {} ({} unresolved) across {} years",
        outcome.dictionary.entries.len(),
        outcome.dictionary.unknown_labels,
        outcome.dictionary.years.len()
    );
    print_issue_counts(&outcome.issues);
    print_written(&outcome.written);
}

pub fn print_extract_summary(outcome: &ExtractOutcome) {
    let summary = &outcome.summary;
    println!(
        "Panel: {} rows x {} columns, {} canonicals",
        summary.rows,
        summary.columns,
        summary.canonicals.len()
    );

    let mut per_year: BTreeMap<i32, YearLine> = BTreeMap::new();
    for row in &outcome.run.audit {
        let line = per_year.entry(row.year).or_default();
        line.files += 1;
        line.missing_required = row.missing_required;
        line.resolved = row.duplicate_canonicals_resolved;
        line.unresolved = row.duplicate_canonicals_unresolved;
    }
    for issue in &outcome.run.issues {
        if let Some(year) = issue.year {
            let line = per_year.entry(year).or_default();
            match issue.severity {
                Severity::Error => line.errors += 1,
                Severity::Warning => line.warnings += 1,
                Severity::Info => {}
            }
        }
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Year"),
        header_cell("Files"),
        header_cell("Missing"),
        header_cell("Dup resolved"),
        header_cell("Dup unresolved"),
        header_cell("Errors"),
        header_cell("Warnings"),
    ]);
    apply_table_style(&mut table);
    for index in 1..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for (year, line) in &per_year {
        let year_cell = if summary.years_without_data.contains(year) {
            dim_cell(year)
        } else {
            Cell::new(year)
        };
        table.add_row(vec![
            year_cell,
            Cell::new(line.files),
            count_cell(line.missing_required, Color::Yellow),
            Cell::new(line.resolved),
            count_cell(line.unresolved, Color::Yellow),
            count_cell(line.errors, Color::Red),
            count_cell(line.warnings, Color::Yellow),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(summary.files).add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(summary.duplicate_canonicals_resolved),
        count_cell(summary.duplicate_canonicals_unresolved, Color::Yellow),
        count_cell(summary.errors, Color::Red),
        count_cell(summary.warnings, Color::Yellow),
    ]);
    println!("{table}");
    print_written(&outcome.written);
}

#[derive(Default)]
struct YearLine {
    files: usize,
    missing_required: usize,
    resolved: usize,
    unresolved: usize,
    errors: usize,
    warnings: usize,
}

fn print_issue_counts(issues: &[Issue]) {
    let warnings = issues
        .iter()
        .filter(|issue| issue.severity == Severity::Warning)
        .count();
    if warnings > 0 {
        println!("Mapping warnings: {warnings}");
    }
}

fn print_written(paths: &[PathBuf]) {
    for path in paths {
        println!("Wrote {}", path.display());
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
