//! Deterministic tie-break scoring for rows competing for one (concept, year).
//!
//! Scores depend only on the row itself, its concept and a frequency table
//! computed over the whole mapping, so the winner never depends on input order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use panel_model::{FileType, MappingRow};
use serde::Serialize;

use crate::concept::is_age_concept;

/// Labels this long earn one length point each, up to [`MAX_LENGTH_POINTS`].
const LABEL_CHARS_PER_POINT: usize = 40;
const MAX_LENGTH_POINTS: i32 = 2;
const MAX_FREQUENCY_POINTS: i32 = 2;

/// A component contributing to the final score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreComponent {
    pub name: &'static str,
    pub value: i32,
}

/// Score for one candidate row with its breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateScore {
    pub total: i32,
    pub components: Vec<ScoreComponent>,
}

impl CandidateScore {
    /// Human-readable explanation of the score.
    pub fn explain(&self) -> String {
        self.components
            .iter()
            .map(|c| format!("{} {:+}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Counts how often each var_code appears across the whole mapping.
pub fn code_frequencies<'a>(rows: impl IntoIterator<Item = &'a MappingRow>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.var_code.clone()).or_insert(0) += 1;
    }
    counts
}

/// Scores candidate rows against a preferred module and a global frequency table.
#[derive(Debug, Clone)]
pub struct ConceptScorer {
    preferred: FileType,
    frequencies: BTreeMap<String, usize>,
}

impl ConceptScorer {
    pub fn new(preferred: FileType, frequencies: BTreeMap<String, usize>) -> Self {
        Self {
            preferred,
            frequencies,
        }
    }

    pub fn preferred(&self) -> FileType {
        self.preferred
    }

    pub fn frequency(&self, var_code: &str) -> usize {
        self.frequencies.get(var_code).copied().unwrap_or(0)
    }

    pub fn score(&self, concept: &str, row: &MappingRow) -> CandidateScore {
        let mut components = Vec::new();
        let label = format!(" {} ", row.label.to_lowercase());

        if label.contains("acc") {
            components.push(ScoreComponent { name: "accurate", value: 3 });
        }
        if label.contains("imp") {
            components.push(ScoreComponent { name: "imputed", value: -3 });
        }
        if row.var_code.ends_with('A') {
            components.push(ScoreComponent { name: "code suffix A", value: 2 });
        }
        if label.contains("value") {
            components.push(ScoreComponent { name: "value", value: 1 });
        }
        if label.contains("whether") || label.contains("wtr") {
            components.push(ScoreComponent { name: "indicator", value: -1 });
        }
        if is_age_concept(concept) {
            if row.file_type == FileType::Fam {
                components.push(ScoreComponent { name: "age from family file", value: 5 });
            }
        } else if row.file_type == self.preferred {
            components.push(ScoreComponent { name: "preferred module", value: 1 });
        }

        let length_points = capped(row.label.chars().count() / LABEL_CHARS_PER_POINT, MAX_LENGTH_POINTS);
        if length_points > 0 {
            components.push(ScoreComponent { name: "label length", value: length_points });
        }
        let frequency_points = capped(self.frequency(&row.var_code), MAX_FREQUENCY_POINTS);
        if frequency_points > 0 {
            components.push(ScoreComponent { name: "code frequency", value: frequency_points });
        }

        CandidateScore {
            total: components.iter().map(|c| c.value).sum(),
            components,
        }
    }
}

fn capped(value: usize, max: i32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX).min(max)
}

/// A mapping row with its derived concept and score.
#[derive(Debug, Clone)]
pub struct ScoredRow<'a> {
    pub row: &'a MappingRow,
    pub concept: String,
    pub score: CandidateScore,
}

impl ScoredRow<'_> {
    fn label_len(&self) -> usize {
        self.row.label.chars().count()
    }
}

/// Total order used to pick a winner: higher score, then module name,
/// then longer label, then var_code.
///
/// The trailing label and category keys only separate rows that agree on
/// every ranking key, keeping the reported winner stable.
pub fn compare_candidates(a: &ScoredRow<'_>, b: &ScoredRow<'_>) -> Ordering {
    b.score
        .total
        .cmp(&a.score.total)
        .then_with(|| a.row.file_type.as_str().cmp(b.row.file_type.as_str()))
        .then_with(|| b.label_len().cmp(&a.label_len()))
        .then_with(|| a.row.var_code.cmp(&b.row.var_code))
        .then_with(|| a.row.label.cmp(&b.row.label))
        .then_with(|| a.row.category.cmp(&b.row.category))
}
