//! Union merge of grid rows that describe the same concept.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::grid::{ConceptGrid, GridRow};

static CELL_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[|,;]\s*|\s{2,}").expect("valid cell separator regex"));

/// Result of merging row groups into their base rows.
#[derive(Debug, Clone, Default)]
pub struct GridMerge {
    /// Full grid with base rows updated in place.
    pub merged: ConceptGrid,
    /// Only the base rows of the applied groups, in grid order.
    pub base_rows: ConceptGrid,
    pub changed_cells: usize,
    pub warnings: Vec<String>,
}

/// Splits a cell into its distinct tokens.
pub fn split_tokens(cell: &str) -> BTreeSet<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return BTreeSet::new();
    }
    CELL_SEPARATOR_RE
        .split(trimmed)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shortest token first, then lexicographic.
fn pick_token<'a>(tokens: impl IntoIterator<Item = &'a String>) -> Option<&'a String> {
    tokens
        .into_iter()
        .min_by(|a, b| a.chars().count().cmp(&b.chars().count()).then_with(|| a.cmp(b)))
}

/// Merges each group of 1-based row numbers into its first row.
///
/// For every year cell the union of tokens across the group is taken; a
/// single token is kept as is, several tokens resolve to the base row's own
/// token when it has one, otherwise to the shortest token.
pub fn merge_grid_rows(grid: &ConceptGrid, groups: &[Vec<usize>]) -> GridMerge {
    let mut merged = grid.clone();
    let mut outcome = GridMerge::default();
    let mut base_indices = BTreeSet::new();
    let row_count = grid.rows.len();

    for group in groups {
        if group.len() < 2 {
            outcome
                .warnings
                .push(format!("skipping group {group:?}: need at least two rows"));
            continue;
        }
        let out_of_range: Vec<usize> = group
            .iter()
            .copied()
            .filter(|index| *index < 1 || *index > row_count)
            .collect();
        if !out_of_range.is_empty() {
            outcome.warnings.push(format!(
                "skipping group {group:?}: rows out of range {out_of_range:?}"
            ));
            continue;
        }
        let base = group[0] - 1;
        base_indices.insert(base);
        for column in 0..grid.years.len() {
            let base_tokens = cell_tokens(&merged.rows[base], column);
            let mut union = BTreeSet::new();
            for index in group {
                union.extend(cell_tokens(&merged.rows[index - 1], column));
            }
            let value = if union.len() > 1 {
                let overlap: Vec<&String> = base_tokens.intersection(&union).collect();
                let chosen = if overlap.is_empty() {
                    pick_token(&union)
                } else {
                    pick_token(overlap)
                };
                let chosen = chosen.cloned();
                outcome.warnings.push(format!(
                    "multiple values in {} for '{}': {:?} (keeping {:?})",
                    grid.years[column], merged.rows[base].concept, union, chosen
                ));
                chosen
            } else {
                union.into_iter().next()
            };
            let old = merged.rows[base].cells[column].clone();
            if old.as_deref().map(str::trim).unwrap_or_default() != value.as_deref().unwrap_or_default() {
                merged.rows[base].cells[column] = value;
                outcome.changed_cells += 1;
            }
        }
    }

    for message in &outcome.warnings {
        warn!("{message}");
    }
    outcome.base_rows = ConceptGrid {
        years: merged.years.clone(),
        rows: base_indices
            .into_iter()
            .map(|index| merged.rows[index].clone())
            .collect(),
    };
    outcome.merged = merged;
    outcome
}

fn cell_tokens(row: &GridRow, column: usize) -> BTreeSet<String> {
    row.cells[column].as_deref().map(split_tokens).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ConceptGrid {
        let cell = |v: &str| (!v.is_empty()).then(|| v.to_string());
        ConceptGrid {
            years: vec![1999, 2001],
            rows: vec![
                GridRow { concept: "stocks".into(), cells: vec![cell("S1"), cell("")] },
                GridRow { concept: "other".into(), cells: vec![cell("X"), cell("X")] },
                GridRow { concept: "stock value".into(), cells: vec![cell("S100"), cell("S2")] },
            ],
        }
    }

    #[test]
    fn splits_on_separators() {
        let tokens = split_tokens(" ER1 | ER2;ER3  ER4 ");
        assert_eq!(tokens.into_iter().collect::<Vec<_>>(), ["ER1", "ER2", "ER3", "ER4"]);
        assert!(split_tokens("   ").is_empty());
    }

    #[test]
    fn merges_union_into_base_row() {
        let outcome = merge_grid_rows(&grid(), &[vec![1, 3]]);
        let base = &outcome.merged.rows[0];
        // base value wins on overlap, the lone value fills the gap
        assert_eq!(base.cells, vec![Some("S1".to_string()), Some("S2".to_string())]);
        assert_eq!(outcome.changed_cells, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.base_rows.rows.len(), 1);
        assert_eq!(outcome.merged.rows.len(), 3);
    }

    #[test]
    fn shortest_token_wins_without_overlap() {
        let outcome = merge_grid_rows(&grid(), &[vec![2, 3]]);
        assert_eq!(outcome.merged.rows[1].cells[0].as_deref(), Some("X"));
        assert_eq!(outcome.merged.rows[1].cells[1].as_deref(), Some("X"));
    }

    #[test]
    fn invalid_groups_are_skipped() {
        let outcome = merge_grid_rows(&grid(), &[vec![1], vec![1, 9]]);
        assert_eq!(outcome.warnings.len(), 2);
        assert_eq!(outcome.merged, grid());
        assert!(outcome.base_rows.rows.is_empty());
    }
}
