//! End-to-end extraction over on-disk fixtures.

use std::collections::BTreeSet;
use std::path::Path;

use panel_core::{YEAR_COLUMN, extract_panel};
use panel_ingest::gather_files;
use panel_model::{
    ColumnDtype, ExtractionOptions, FileType, MappingRow, PanelError, RunMode, Severity,
};
use polars::prelude::DataFrame;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn years(panel: &DataFrame) -> Vec<Option<i32>> {
    panel.column(YEAR_COLUMN).unwrap().i32().unwrap().into_iter().collect()
}

fn floats(panel: &DataFrame, name: &str) -> Vec<Option<f64>> {
    panel.column(name).unwrap().f64().unwrap().into_iter().collect()
}

fn income_wealth_mapping() -> Vec<MappingRow> {
    vec![
        MappingRow::new("income", 1999, FileType::Fam, "ER1")
            .with_label("Income")
            .with_dtype(Some(ColumnDtype::Float64)),
        MappingRow::new("income", 2001, FileType::Fam, "ER1")
            .with_label("Income")
            .with_dtype(Some(ColumnDtype::Float64)),
        MappingRow::new("wealth", 1999, FileType::Wlth, "S1")
            .with_label("Wealth")
            .with_dtype(Some(ColumnDtype::Float64)),
    ]
}

fn income_wealth_files(dir: &Path) {
    write(dir, "FAM1999_full.csv", "ER1\nTotal Income\n1.0\n2.0\n");
    write(dir, "FAM2001_full.csv", "ER1\nTotal Income\n3.0\n");
    write(dir, "WLTH1999_full.csv", "S1\nNet Worth\n10.0\n20.0\n");
}

fn all_modules() -> BTreeSet<FileType> {
    BTreeSet::from(FileType::ALL)
}

#[test]
fn test_panel_rows_and_audit() {
    let dir = TempDir::new().unwrap();
    income_wealth_files(dir.path());
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();
    let options = ExtractionOptions::new().with_coerce_types(true);

    let run = extract_panel(&income_wealth_mapping(), &files, &options, 1).unwrap();

    assert_eq!(run.canonicals, vec!["income", "wealth"]);
    assert_eq!(years(&run.panel), vec![Some(1999), Some(1999), Some(2001)]);
    assert_eq!(floats(&run.panel, "income"), vec![Some(1.0), Some(2.0), Some(3.0)]);
    assert_eq!(floats(&run.panel, "wealth"), vec![Some(10.0), Some(20.0), None]);

    let audit: Vec<(i32, &str, usize, usize)> = run
        .audit
        .iter()
        .map(|row| (row.year, row.file.as_str(), row.present_cols, row.missing_required))
        .collect();
    assert_eq!(
        audit,
        vec![
            (1999, "FAM1999_full.csv", 1, 0),
            (1999, "WLTH1999_full.csv", 1, 0),
            (2001, "FAM2001_full.csv", 1, 1),
        ]
    );
    assert_eq!(run.count(Severity::Error), 0);
    assert_eq!(run.count(Severity::Info), 2);
}

#[test]
fn test_year_without_files_is_recorded() {
    let dir = TempDir::new().unwrap();
    income_wealth_files(dir.path());
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();
    let mut rows = income_wealth_mapping();
    rows.push(MappingRow::new("income", 2003, FileType::Fam, "ER1"));

    let run = extract_panel(&rows, &files, &ExtractionOptions::default(), 1).unwrap();

    assert_eq!(run.years, vec![1999, 2001]);
    assert_eq!(years(&run.panel), vec![Some(1999), Some(1999), Some(2001)]);
    let errors: Vec<_> = run
        .issues
        .iter()
        .filter(|issue| issue.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].year, Some(2003));
    assert!(run.audit.iter().all(|row| row.year != 2003));

    let summary = run.summary();
    assert_eq!(summary.years_without_data, vec![2003]);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.rows, 3);
}

#[test]
fn test_duplicate_sources_summed() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "FAM1999.csv", "ER1,ER2,ER3\nA,B,C\n,5,x\n3,,y\n");
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();
    let rows = vec![
        MappingRow::new("income", 1999, FileType::Fam, "ER1").with_transform("sum_non_na"),
        MappingRow::new("income", 1999, FileType::Fam, "ER2"),
    ];
    let options = ExtractionOptions::new().with_transforms(true);

    let run = extract_panel(&rows, &files, &options, 1).unwrap();

    assert_eq!(floats(&run.panel, "income"), vec![Some(5.0), Some(3.0)]);
    assert_eq!(run.audit.len(), 1);
    assert_eq!(run.audit[0].present_cols, 2);
    assert_eq!(run.audit[0].duplicate_canonicals_resolved, 1);
    assert_eq!(run.audit[0].duplicate_canonicals_unresolved, 0);
}

#[test]
fn test_unresolved_duplicates() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "FAM1999.csv", "ER1,ER2\nA,B\n1,2\n");
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();
    let rows = vec![
        MappingRow::new("income", 1999, FileType::Fam, "ER1"),
        MappingRow::new("income", 1999, FileType::Fam, "ER2"),
    ];

    let permissive = ExtractionOptions::new().with_transforms(true);
    let run = extract_panel(&rows, &files, &permissive, 1).unwrap();
    assert_eq!(run.audit[0].duplicate_canonicals_unresolved, 1);
    assert_eq!(run.count(Severity::Warning), 1);
    let kept: Vec<Option<&str>> = run
        .panel
        .column("income")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(kept, vec![Some("1")]);

    let strict = permissive.with_mode(RunMode::Strict);
    let result = extract_panel(&rows, &files, &strict, 1);
    assert!(matches!(result, Err(PanelError::DuplicateCanonical { year: 1999, .. })));
}

#[test]
fn test_strict_abort_escapes_worker_pool() {
    let dir = TempDir::new().unwrap();
    let mut rows = Vec::new();
    for year in [1999, 2001, 2003] {
        write(dir.path(), &format!("FAM{year}.csv"), "ER1,ER2\nA,B\n1,2\n");
        rows.push(MappingRow::new("income", year, FileType::Fam, "ER1"));
        rows.push(MappingRow::new("income", year, FileType::Fam, "ER2"));
    }
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();

    let result = extract_panel(&rows, &files, &ExtractionOptions::strict(), 3);
    match result {
        Err(PanelError::DuplicateCanonical { canonical, columns, .. }) => {
            assert_eq!(canonical, "income");
            assert_eq!(columns, 2);
        }
        other => panic!("expected a duplicate canonical error, got {other:?}"),
    }
}

#[test]
fn test_index_columns_order_and_sort_panel() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "FAM1999.csv", "ER9,ER1\nid,income\n2,20\n1,10\n");
    write(dir.path(), "FAM2001.csv", "ER9,ER1\nid,income\n3,30\n1,11\n");
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();
    let rows: Vec<MappingRow> = [1999, 2001]
        .into_iter()
        .flat_map(|year| {
            [
                MappingRow::new("income", year, FileType::Fam, "ER1"),
                MappingRow::new("pid", year, FileType::Fam, "ER9"),
            ]
        })
        .collect();
    let options = ExtractionOptions::default()
        .with_index_cols(["pid".to_string(), "missing".to_string()]);

    let run = extract_panel(&rows, &files, &options, 2).unwrap();

    let names: Vec<&str> = run
        .panel
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, vec![YEAR_COLUMN, "pid", "income"]);
    assert_eq!(years(&run.panel), vec![Some(1999), Some(1999), Some(2001), Some(2001)]);
    let pid: Vec<Option<&str>> = run.panel.column("pid").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(pid, vec![Some("1"), Some("2"), Some("1"), Some("3")]);
    let income: Vec<Option<&str>> =
        run.panel.column("income").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(income, vec![Some("10"), Some("20"), Some("11"), Some("30")]);
    assert_eq!(run.canonicals, vec!["income", "pid"]);
}

#[test]
fn test_first_file_claims_column() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "FAM1999a.csv", "ER1\nlabel\n1\n");
    write(dir.path(), "FAM1999b.csv", "ER1,ER2\nlabel,label\n9,4\n");
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();
    let rows = vec![
        MappingRow::new("income", 1999, FileType::Fam, "ER1"),
        MappingRow::new("kids", 1999, FileType::Fam, "ER2"),
    ];

    let run = extract_panel(&rows, &files, &ExtractionOptions::default(), 1).unwrap();

    assert_eq!(run.audit[0].present_cols, 1);
    assert_eq!(run.audit[1].present_cols, 1);
    assert_eq!(run.audit[1].missing_required, 0);
    assert!(run
        .issues
        .iter()
        .any(|issue| issue.message.contains("already assigned columns: ER1")));
    let income: Vec<Option<&str>> = run
        .panel
        .column("income")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(income, vec![Some("1")]);
}

#[test]
fn test_transforms_run_after_coercion() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "FAM1999.csv", "ER1\nlabel\n1\n9999\n150\n-5\n");
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();
    let rows = vec![
        MappingRow::new("income", 1999, FileType::Fam, "ER1")
            .with_dtype(Some(ColumnDtype::Float64))
            .with_transform("na_codes:[9999]; clip:[0,100]"),
    ];
    let options = ExtractionOptions::new()
        .with_transforms(true)
        .with_coerce_types(true);

    let run = extract_panel(&rows, &files, &options, 1).unwrap();
    assert_eq!(
        floats(&run.panel, "income"),
        vec![Some(1.0), None, Some(100.0), Some(0.0)]
    );
}

#[test]
fn test_parallel_matches_sequential() {
    let dir = TempDir::new().unwrap();
    for year in [1999, 2001, 2003, 2005] {
        write(
            dir.path(),
            &format!("FAM{year}.csv"),
            &format!("ER1\nlabel\n{year}\n1\n"),
        );
    }
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();
    let rows: Vec<MappingRow> = [2005, 1999, 2003, 2001]
        .into_iter()
        .map(|year| MappingRow::new("income", year, FileType::Fam, "ER1"))
        .collect();
    let options = ExtractionOptions::default();

    let sequential = extract_panel(&rows, &files, &options, 1).unwrap();
    let parallel = extract_panel(&rows, &files, &options, 4).unwrap();

    assert_eq!(years(&parallel.panel), years(&sequential.panel));
    assert_eq!(parallel.audit, sequential.audit);
    assert_eq!(parallel.issues, sequential.issues);
    assert_eq!(parallel.years, vec![1999, 2001, 2003, 2005]);
}

#[test]
fn test_unreadable_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    income_wealth_files(dir.path());
    write(dir.path(), "WLTH2001.csv", "");
    let files = gather_files(dir.path(), &all_modules(), None).unwrap();

    let run = extract_panel(&income_wealth_mapping(), &files, &ExtractionOptions::strict(), 1)
        .unwrap();
    assert_eq!(run.panel.height(), 3);
    assert!(run
        .issues
        .iter()
        .any(|issue| issue.severity == Severity::Warning && issue.message.contains("WLTH2001.csv")));
}
