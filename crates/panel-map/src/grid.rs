//! Concept × year grid of winning variable codes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use panel_model::{FileType, MappingRow, PanelError, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::concept::{derive_concept, normalize_label};
use crate::score::{ConceptScorer, ScoredRow, code_frequencies, compare_candidates};

/// Concepts folded into another concept before scoring.
pub const CONCEPT_MERGES: &[(&str, &str)] = &[(
    "retirement/ira :: value vehicles",
    "fam/unknown :: value vehicles",
)];

static IMP_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bIMP\b").expect("valid imputation regex"));

#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Module earning the preference point outside age concepts.
    pub preferred: FileType,
    /// Drop rows whose label carries the word `IMP`.
    pub drop_imp: bool,
    pub years: Option<BTreeSet<i32>>,
    /// Concept renames applied before scoring.
    pub merges: BTreeMap<String, String>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            preferred: FileType::Wlth,
            drop_imp: false,
            years: None,
            merges: CONCEPT_MERGES
                .iter()
                .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
                .collect(),
        }
    }
}

impl GridOptions {
    #[must_use]
    pub fn with_preferred(mut self, preferred: FileType) -> Self {
        self.preferred = preferred;
        self
    }

    #[must_use]
    pub fn with_drop_imp(mut self, enable: bool) -> Self {
        self.drop_imp = enable;
        self
    }

    #[must_use]
    pub fn with_years(mut self, years: Option<BTreeSet<i32>>) -> Self {
        self.years = years;
        self
    }

    fn merged<'a>(&'a self, concept: &'a str) -> &'a str {
        self.merges.get(concept).map_or(concept, String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    pub concept: String,
    /// One cell per grid year; `None` is an empty cell.
    pub cells: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptGrid {
    pub years: Vec<i32>,
    pub rows: Vec<GridRow>,
}

impl ConceptGrid {
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["row".to_string(), "concept".to_string()];
        header.extend(self.years.iter().map(ToString::to_string));
        header
    }

    /// Records aligned with [`ConceptGrid::header`], rows numbered from 1.
    pub fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let mut record = vec![(index + 1).to_string(), row.concept.clone()];
                record.extend(row.cells.iter().map(|cell| cell.clone().unwrap_or_default()));
                record
            })
            .collect()
    }

    /// Rebuilds a grid from CSV text columns.
    ///
    /// Columns named like a year become grid years; `row` is recomputed and
    /// any other column is ignored.
    pub fn from_records(header: &[String], records: &[Vec<String>]) -> Result<Self> {
        let concept_index = header
            .iter()
            .position(|name| name.trim() == "concept")
            .ok_or_else(|| PanelError::InvalidGrid("no 'concept' column".to_string()))?;
        let year_columns: Vec<(usize, i32)> = header
            .iter()
            .enumerate()
            .filter_map(|(index, name)| name.trim().parse::<i32>().ok().map(|year| (index, year)))
            .collect();
        let rows = records
            .iter()
            .map(|record| GridRow {
                concept: record.get(concept_index).cloned().unwrap_or_default(),
                cells: year_columns
                    .iter()
                    .map(|(index, _)| {
                        record
                            .get(*index)
                            .map(|value| value.trim().to_string())
                            .filter(|value| !value.is_empty())
                    })
                    .collect(),
            })
            .collect();
        Ok(Self {
            years: year_columns.into_iter().map(|(_, year)| year).collect(),
            rows,
        })
    }

    pub fn cell(&self, concept: &str, year: i32) -> Option<&str> {
        let column = self.years.iter().position(|y| *y == year)?;
        self.rows
            .iter()
            .find(|row| row.concept == concept)
            .and_then(|row| row.cells[column].as_deref())
    }
}

/// A row that competed with others for one (concept, year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRow {
    pub concept: String,
    pub year: i32,
    pub var_code: String,
    pub label: String,
    pub file_type: FileType,
    pub category: String,
    pub score: i32,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearCoverage {
    pub year: i32,
    pub n_concepts: usize,
}

/// Winner of a concept seen in at most one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RareConcept {
    pub concept: String,
    pub n_years: usize,
    pub year: i32,
    pub var_code: String,
    pub label: String,
    pub file_type: FileType,
}

/// Row whose label normalized to nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeftoverRow {
    pub year: i32,
    pub var_code: String,
    pub label: String,
    pub file_type: FileType,
    pub category: String,
    pub normalized: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConceptEntry {
    pub concept: String,
    pub example_label: String,
    pub any_file_type: FileType,
    pub any_category: String,
}

#[derive(Debug, Clone, Default)]
pub struct GridReport {
    pub grid: ConceptGrid,
    pub conflicts: Vec<ConflictRow>,
    pub coverage: Vec<YearCoverage>,
    pub rarity: Vec<RareConcept>,
    pub leftovers: Vec<LeftoverRow>,
    pub dictionary: Vec<ConceptEntry>,
    /// Rows removed by the `IMP` filter.
    pub dropped_imputed: usize,
}

/// Scores every mapping row, picks one winner per (concept, year) and pivots
/// the winners into a grid with its diagnostic reports.
pub fn build_grid(rows: &[MappingRow], options: &GridOptions) -> GridReport {
    let mut report = GridReport::default();
    let mut kept: Vec<(&MappingRow, String)> = Vec::new();
    for row in rows {
        if options.years.as_ref().is_some_and(|years| !years.contains(&row.year)) {
            continue;
        }
        if options.drop_imp && IMP_WORD_RE.is_match(&row.label) {
            report.dropped_imputed += 1;
            continue;
        }
        match derive_concept(&row.label, &row.category) {
            Some(concept) => kept.push((row, options.merged(&concept).to_string())),
            None => report.leftovers.push(LeftoverRow {
                year: row.year,
                var_code: row.var_code.clone(),
                label: row.label.clone(),
                file_type: row.file_type,
                category: row.category.clone(),
                normalized: normalize_label(&row.label),
            }),
        }
    }

    let scorer = ConceptScorer::new(options.preferred, code_frequencies(kept.iter().map(|(row, _)| *row)));
    let mut groups: BTreeMap<(String, i32), Vec<ScoredRow<'_>>> = BTreeMap::new();
    for (row, concept) in kept {
        let score = scorer.score(&concept, row);
        groups
            .entry((concept.clone(), row.year))
            .or_default()
            .push(ScoredRow { row, concept, score });
    }

    let mut winners: BTreeMap<String, BTreeMap<i32, &MappingRow>> = BTreeMap::new();
    for ((concept, year), mut candidates) in groups {
        candidates.sort_by(compare_candidates);
        if candidates.len() > 1 {
            debug!(concept = %concept, year, candidates = candidates.len(), "tie-break");
            report.conflicts.extend(candidates.iter().map(|candidate| ConflictRow {
                concept: concept.clone(),
                year,
                var_code: candidate.row.var_code.clone(),
                label: candidate.row.label.clone(),
                file_type: candidate.row.file_type,
                category: candidate.row.category.clone(),
                score: candidate.score.total,
                explanation: candidate.score.explain(),
            }));
        }
        winners.entry(concept).or_default().insert(year, candidates[0].row);
    }
    report.conflicts.sort_by(|a, b| {
        a.concept
            .cmp(&b.concept)
            .then(a.year.cmp(&b.year))
            .then(b.score.cmp(&a.score))
            .then_with(|| a.var_code.cmp(&b.var_code))
    });

    let years: Vec<i32> = winners
        .values()
        .flat_map(BTreeMap::keys)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    report.coverage = years
        .iter()
        .map(|year| YearCoverage {
            year: *year,
            n_concepts: winners.values().filter(|by_year| by_year.contains_key(year)).count(),
        })
        .collect();

    for (concept, by_year) in &winners {
        // by_year is non-empty: every concept entered through a candidate group.
        if let Some((_, first)) = by_year.iter().next() {
            report.dictionary.push(ConceptEntry {
                concept: concept.clone(),
                example_label: first.label.clone(),
                any_file_type: first.file_type,
                any_category: first.category.clone(),
            });
        }
        if by_year.len() <= 1 {
            report.rarity.extend(by_year.iter().map(|(year, row)| RareConcept {
                concept: concept.clone(),
                n_years: by_year.len(),
                year: *year,
                var_code: row.var_code.clone(),
                label: row.label.clone(),
                file_type: row.file_type,
            }));
        }
    }

    report.grid = ConceptGrid {
        rows: winners
            .iter()
            .map(|(concept, by_year)| GridRow {
                concept: concept.clone(),
                cells: years
                    .iter()
                    .map(|year| by_year.get(year).map(|row| row.var_code.clone()))
                    .collect(),
            })
            .collect(),
        years,
    };
    info!(
        concepts = report.grid.rows.len(),
        years = report.grid.years.len(),
        conflicts = report.conflicts.len(),
        leftovers = report.leftovers.len(),
        "built canonical grid"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: i32, module: FileType, code: &str, label: &str, category: &str) -> MappingRow {
        MappingRow::new("", year, module, code)
            .with_label(label)
            .with_category(category)
    }

    #[test]
    fn pivots_winners_and_reports() {
        let rows = vec![
            row(2001, FileType::Fam, "ER2", "Total income 2001", "income"),
            row(1999, FileType::Fam, "ER1", "Total income 1999", "income"),
            row(1999, FileType::Wlth, "S1", "Total income 1999", "income"),
            row(1999, FileType::Wlth, "S9", "Of the", "misc"),
            row(2001, FileType::Wlth, "S20", "Value of stocks", "assets"),
        ];
        let report = build_grid(&rows, &GridOptions::default());

        assert_eq!(report.grid.years, vec![1999, 2001]);
        assert_eq!(report.grid.cell("income :: total income", 1999), Some("S1"));
        assert_eq!(report.grid.cell("income :: total income", 2001), Some("ER2"));
        assert_eq!(report.grid.cell("assets :: value stocks", 1999), None);
        assert_eq!(report.conflicts.len(), 2);
        assert_eq!(report.conflicts[0].var_code, "S1");
        assert_eq!(report.leftovers.len(), 1);
        assert_eq!(report.leftovers[0].var_code, "S9");
        assert_eq!(
            report.coverage,
            vec![
                YearCoverage { year: 1999, n_concepts: 1 },
                YearCoverage { year: 2001, n_concepts: 2 },
            ]
        );
        assert_eq!(report.rarity.len(), 1);
        assert_eq!(report.rarity[0].concept, "assets :: value stocks");
        assert_eq!(report.dictionary[1].example_label, "Total income 1999");
    }

    #[test]
    fn concept_merges_compete_together() {
        let rows = vec![
            row(2005, FileType::Wlth, "S505", "Value of vehicles", "Retirement/IRA"),
            row(2005, FileType::Fam, "ER505A", "Value of vehicles", "FAM/Unknown"),
        ];
        let report = build_grid(&rows, &GridOptions::default());
        assert_eq!(report.grid.rows.len(), 1);
        assert_eq!(report.grid.rows[0].concept, "fam/unknown :: value vehicles");
        // suffix A (+2) beats the preferred module (+1)
        assert_eq!(report.grid.cell("fam/unknown :: value vehicles", 2005), Some("ER505A"));
    }

    #[test]
    fn drop_imp_and_year_filters() {
        let rows = vec![
            row(1999, FileType::Fam, "ER1", "IMP total income", "income"),
            row(1999, FileType::Fam, "ER2", "Total income", "income"),
            row(2003, FileType::Fam, "ER3", "Total income", "income"),
        ];
        let options = GridOptions::default()
            .with_drop_imp(true)
            .with_years(Some(BTreeSet::from([1999])));
        let report = build_grid(&rows, &options);
        assert_eq!(report.dropped_imputed, 1);
        assert_eq!(report.grid.years, vec![1999]);
        assert_eq!(report.grid.cell("income :: total income", 1999), Some("ER2"));
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn grid_round_trips_through_records() {
        let rows = vec![
            row(1999, FileType::Fam, "ER1", "Total income", "income"),
            row(2001, FileType::Fam, "ER2", "Value of stocks", "assets"),
        ];
        let grid = build_grid(&rows, &GridOptions::default()).grid;
        let rebuilt = ConceptGrid::from_records(&grid.header(), &grid.records()).expect("rebuild");
        assert_eq!(rebuilt, grid);
    }

    #[test]
    fn grid_without_concept_column_is_rejected() {
        let header = vec!["row".to_string(), "1999".to_string()];
        let result = ConceptGrid::from_records(&header, &[vec!["1".to_string(), "ER1".to_string()]]);
        assert!(matches!(result, Err(PanelError::InvalidGrid(_))));
    }
}
