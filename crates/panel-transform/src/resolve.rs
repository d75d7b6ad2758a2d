//! Collapses several source columns of one canonical into a single column.

use panel_model::{Diagnostics, ExtractionOptions, Issue, PanelError, Result};
use polars::prelude::Column;
use tracing::debug;

use crate::dsl::DuplicateStrategy;
use crate::values::ColumnValues;

/// Outcome of resolving one canonical in one year.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub column: Column,
    /// Extra source columns folded in by a strategy.
    pub resolved: usize,
    /// Extra source columns discarded without a strategy.
    pub unresolved: usize,
}

/// Resolves `sources` (in claim order) into one column named `canonical`.
///
/// `height` sizes the all-missing column produced when there are no sources.
pub fn resolve_duplicates(
    canonical: &str,
    year: i32,
    sources: &[Column],
    strategy: Option<DuplicateStrategy>,
    options: &ExtractionOptions,
    height: usize,
    diagnostics: &mut Diagnostics,
) -> Result<Resolution> {
    let Some(first) = sources.first() else {
        return Ok(Resolution {
            column: ColumnValues::missing(height).into_column(canonical),
            resolved: 0,
            unresolved: 0,
        });
    };
    let extra = sources.len() - 1;
    if extra == 0 {
        return Ok(Resolution {
            column: first.clone().with_name(canonical.into()),
            resolved: 0,
            unresolved: 0,
        });
    }

    let Some(strategy) = strategy else {
        if options.apply_transforms {
            diagnostics.report(PanelError::DuplicateCanonical {
                canonical: canonical.to_string(),
                year,
                columns: sources.len(),
            })?;
        } else {
            diagnostics.push(
                Issue::warning(format!(
                    "{canonical} has {} source columns in {year}; keeping {} (transforms disabled)",
                    sources.len(),
                    first.name()
                ))
                .with_canonical(canonical),
            );
        }
        return Ok(Resolution {
            column: first.clone().with_name(canonical.into()),
            resolved: 0,
            unresolved: extra,
        });
    };

    let values = sources
        .iter()
        .map(ColumnValues::from_column)
        .collect::<Result<Vec<_>>>()?;
    let combined = match strategy {
        DuplicateStrategy::FirstNonNa => first_non_na(values),
        DuplicateStrategy::SumNonNa => {
            ColumnValues::Float(fold_numeric(&values, |acc, v| acc + v))
        }
        DuplicateStrategy::MaxNonNa => ColumnValues::Float(fold_numeric(&values, f64::max)),
    };
    debug!(canonical, year, columns = sources.len(), strategy = %strategy, "resolved duplicate columns");
    Ok(Resolution {
        column: combined.into_column(canonical),
        resolved: extra,
        unresolved: 0,
    })
}

fn first_present<T: Clone>(columns: &[&Vec<Option<T>>]) -> Vec<Option<T>> {
    let height = columns.first().map_or(0, |c| c.len());
    (0..height)
        .map(|row| columns.iter().find_map(|column| column.get(row).cloned().flatten()))
        .collect()
}

/// Row-wise first non-missing value, keeping the source type when all
/// sources agree on it.
fn first_non_na(values: Vec<ColumnValues>) -> ColumnValues {
    let floats: Option<Vec<&Vec<Option<f64>>>> = values
        .iter()
        .map(|v| match v {
            ColumnValues::Float(items) => Some(items),
            _ => None,
        })
        .collect();
    if let Some(floats) = floats {
        return ColumnValues::Float(first_present(&floats));
    }
    let ints: Option<Vec<&Vec<Option<i64>>>> = values
        .iter()
        .map(|v| match v {
            ColumnValues::Int(items) => Some(items),
            _ => None,
        })
        .collect();
    if let Some(ints) = ints {
        return ColumnValues::Int(first_present(&ints));
    }
    let texts: Vec<Vec<Option<String>>> = values.iter().map(ColumnValues::to_text).collect();
    let refs: Vec<&Vec<Option<String>>> = texts.iter().collect();
    ColumnValues::Text(first_present(&refs))
}

/// Row-wise fold over numeric views; all-missing rows stay missing.
fn fold_numeric(values: &[ColumnValues], fold: impl Fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let numeric: Vec<Vec<Option<f64>>> = values.iter().map(ColumnValues::to_numeric).collect();
    let height = numeric.first().map_or(0, Vec::len);
    (0..height)
        .map(|row| {
            numeric
                .iter()
                .filter_map(|column| column.get(row).copied().flatten())
                .reduce(&fold)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::{RunMode, Severity};
    use polars::prelude::*;

    fn text(name: &str, values: &[Option<&str>]) -> Column {
        Column::new(name.into(), values.to_vec())
    }

    fn resolve(
        sources: &[Column],
        strategy: Option<DuplicateStrategy>,
        options: &ExtractionOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<Resolution> {
        resolve_duplicates("wealth", 1999, sources, strategy, options, 2, diagnostics)
    }

    fn floats(column: &Column) -> Vec<Option<f64>> {
        column.f64().expect("float column").into_iter().collect()
    }

    #[test]
    fn sum_keeps_all_missing_rows_missing() {
        let sources = [
            text("S1", &[None, Some("5"), None]),
            text("S2", &[Some("3"), None, None]),
        ];
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let resolution = resolve(
            &sources,
            Some(DuplicateStrategy::SumNonNa),
            &ExtractionOptions::default(),
            &mut diagnostics,
        )
        .expect("resolve");
        assert_eq!(floats(&resolution.column), vec![Some(3.0), Some(5.0), None]);
        assert_eq!(resolution.resolved, 1);
        assert_eq!(resolution.column.name().as_str(), "wealth");
    }

    #[test]
    fn max_ignores_missing() {
        let sources = [
            text("S1", &[Some("7"), None]),
            text("S2", &[Some("2"), Some("4")]),
            text("S3", &[Some("9"), None]),
        ];
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let resolution = resolve(
            &sources,
            Some(DuplicateStrategy::MaxNonNa),
            &ExtractionOptions::default(),
            &mut diagnostics,
        )
        .expect("resolve");
        assert_eq!(floats(&resolution.column), vec![Some(9.0), Some(4.0)]);
        assert_eq!(resolution.resolved, 2);
    }

    #[test]
    fn first_non_na_scans_left_to_right() {
        let sources = [
            text("S1", &[None, Some("a"), None]),
            text("S2", &[Some("b"), Some("c"), None]),
        ];
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let resolution = resolve(
            &sources,
            Some(DuplicateStrategy::FirstNonNa),
            &ExtractionOptions::default(),
            &mut diagnostics,
        )
        .expect("resolve");
        let values: Vec<Option<&str>> = resolution.column.str().expect("text").into_iter().collect();
        assert_eq!(values, vec![Some("b"), Some("a"), None]);
    }

    #[test]
    fn missing_strategy_keeps_first_column() {
        let sources = [text("S1", &[Some("1")]), text("S2", &[Some("2")])];
        let mut diagnostics = Diagnostics::for_year(RunMode::Permissive, 1999);
        let resolution = resolve(&sources, None, &ExtractionOptions::default(), &mut diagnostics)
            .expect("resolve");
        assert_eq!(resolution.unresolved, 1);
        assert_eq!(diagnostics.issues()[0].severity, Severity::Warning);
        let values: Vec<Option<&str>> = resolution.column.str().expect("text").into_iter().collect();
        assert_eq!(values, vec![Some("1")]);
    }

    #[test]
    fn missing_strategy_with_transforms_is_fatal_when_strict() {
        let sources = [text("S1", &[Some("1")]), text("S2", &[Some("2")])];
        let mut diagnostics = Diagnostics::new(RunMode::Strict);
        let result = resolve(&sources, None, &ExtractionOptions::strict(), &mut diagnostics);
        assert!(matches!(
            result,
            Err(PanelError::DuplicateCanonical { columns: 2, .. })
        ));
    }

    #[test]
    fn no_sources_yield_missing_column() {
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let resolution = resolve(&[], None, &ExtractionOptions::default(), &mut diagnostics)
            .expect("resolve");
        assert_eq!(resolution.column.len(), 2);
        assert_eq!(resolution.column.null_count(), 2);
    }
}
