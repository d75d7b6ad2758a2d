//! Executes parsed transform operations on a column, in order.

use panel_model::Result;
use polars::prelude::Column;
use tracing::trace;

use crate::dsl::{NaCode, TransformOperation};
use crate::values::{ColumnValues, float_text};

/// Applies `operations` to `column` and returns the transformed column under
/// the same name.
pub fn apply_operations(column: &Column, operations: &[TransformOperation]) -> Result<Column> {
    if operations.is_empty() {
        return Ok(column.clone());
    }
    let name = column.name().to_string();
    let mut values = ColumnValues::from_column(column)?;
    for operation in operations {
        values = apply_operation(values, operation);
        trace!(column = %name, operation = %operation, nulls = values.null_count(), "applied transform");
    }
    Ok(values.into_column(&name))
}

pub fn apply_operation(values: ColumnValues, operation: &TransformOperation) -> ColumnValues {
    match operation {
        TransformOperation::ToInt => ColumnValues::Int(values.to_integers().0),
        TransformOperation::ToFloat => ColumnValues::Float(values.to_numeric()),
        TransformOperation::Strip => map_text(&values, |text| text.trim().to_string()),
        TransformOperation::Lower => map_text(&values, str::to_lowercase),
        TransformOperation::Upper => map_text(&values, str::to_uppercase),
        TransformOperation::NaBlankToNan => match values {
            ColumnValues::Text(texts) => ColumnValues::Text(
                texts
                    .into_iter()
                    .map(|value| value.filter(|text| !text.is_empty()))
                    .collect(),
            ),
            other => other,
        },
        TransformOperation::NaCodes { codes } => mask_codes(values, codes),
        TransformOperation::Clip { min, max } => ColumnValues::Float(
            values
                .to_numeric()
                .into_iter()
                .map(|value| value.map(|v| clamp(v, *min, *max)))
                .collect(),
        ),
        TransformOperation::Winsor { p } => winsorize(&values, *p),
    }
}

fn map_text(values: &ColumnValues, f: impl Fn(&str) -> String) -> ColumnValues {
    ColumnValues::Text(
        values
            .to_text()
            .into_iter()
            .map(|value| value.map(|text| f(&text)))
            .collect(),
    )
}

fn clamp(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let value = min.map_or(value, |low| value.max(low));
    max.map_or(value, |high| value.min(high))
}

/// Masks values equal to any code, natively or through their text form.
fn mask_codes(values: ColumnValues, codes: &[NaCode]) -> ColumnValues {
    let texts: Vec<String> = codes.iter().map(NaCode::text).collect();
    let text_hit = |text: &str| texts.iter().any(|code| code == text);
    let number_hit = |number: f64| codes.iter().any(|code| code.matches_number(number));
    match values {
        ColumnValues::Text(items) => ColumnValues::Text(
            items
                .into_iter()
                .map(|value| value.filter(|text| !text_hit(text)))
                .collect(),
        ),
        ColumnValues::Float(items) => ColumnValues::Float(
            items
                .into_iter()
                .map(|value| value.filter(|v| !number_hit(*v) && !text_hit(&float_text(*v))))
                .collect(),
        ),
        ColumnValues::Int(items) => ColumnValues::Int(
            items
                .into_iter()
                .map(|value| value.filter(|v| !number_hit(*v as f64) && !text_hit(&v.to_string())))
                .collect(),
        ),
    }
}

/// Linear-interpolated quantile of sorted values.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    if fraction == 0.0 {
        return Some(sorted[lower]);
    }
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

fn winsorize(values: &ColumnValues, p: f64) -> ColumnValues {
    let numbers = values.to_numeric();
    let mut sorted: Vec<f64> = numbers.iter().flatten().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let (Some(low), Some(high)) = (quantile(&sorted, p), quantile(&sorted, 1.0 - p)) else {
        return ColumnValues::Float(numbers);
    };
    ColumnValues::Float(
        numbers
            .into_iter()
            .map(|value| value.map(|v| clamp(v, Some(low), Some(high))))
            .collect(),
    )
}
