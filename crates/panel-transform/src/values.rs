//! Row-aligned column values used by the executors.
//!
//! Columns are lifted out of polars into one of three nullable vectors, worked
//! on in plain Rust, and turned back into a [`Column`] afterwards.

use panel_model::{PanelError, Result};
use polars::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Text(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
}

pub(crate) fn frame_error(error: PolarsError) -> PanelError {
    PanelError::Frame(error.to_string())
}

/// Renders a float the way the panel prints it (`1.0`, `0.25`).
pub fn float_text(value: f64) -> String {
    format!("{value:?}")
}

/// Parses numeric text; blanks, garbage and NaN become `None`.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Integer view of a float when it has no fractional part and fits `i64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn integral(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

impl ColumnValues {
    pub fn from_column(column: &Column) -> Result<Self> {
        let dtype = column.dtype().clone();
        let values = match dtype {
            DataType::String => Self::Text(
                column
                    .str()
                    .map_err(frame_error)?
                    .into_iter()
                    .map(|value| value.map(str::to_string))
                    .collect(),
            ),
            DataType::Float64 => Self::Float(column.f64().map_err(frame_error)?.into_iter().collect()),
            DataType::Int64 => Self::Int(column.i64().map_err(frame_error)?.into_iter().collect()),
            DataType::Float32 => {
                let cast = column.cast(&DataType::Float64).map_err(frame_error)?;
                Self::Float(cast.f64().map_err(frame_error)?.into_iter().collect())
            }
            DataType::Null => Self::Text(vec![None; column.len()]),
            other if other.is_integer() => {
                let cast = column.cast(&DataType::Int64).map_err(frame_error)?;
                Self::Int(cast.i64().map_err(frame_error)?.into_iter().collect())
            }
            _ => {
                let cast = column.cast(&DataType::String).map_err(frame_error)?;
                Self::Text(
                    cast.str()
                        .map_err(frame_error)?
                        .into_iter()
                        .map(|value| value.map(str::to_string))
                        .collect(),
                )
            }
        };
        Ok(values)
    }

    /// All-missing text column.
    pub fn missing(len: usize) -> Self {
        Self::Text(vec![None; len])
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::Int(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extends with missing values up to `len`.
    pub fn pad_to(&mut self, len: usize) {
        match self {
            Self::Text(values) => values.resize(len.max(values.len()), None),
            Self::Float(values) => values.resize(len.max(values.len()), None),
            Self::Int(values) => values.resize(len.max(values.len()), None),
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Self::Text(values) => values.iter().filter(|v| v.is_none()).count(),
            Self::Float(values) => values.iter().filter(|v| v.is_none()).count(),
            Self::Int(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    pub fn into_column(self, name: &str) -> Column {
        match self {
            Self::Text(values) => Column::new(name.into(), values),
            Self::Float(values) => Column::new(name.into(), values),
            Self::Int(values) => Column::new(name.into(), values),
        }
    }

    /// Nullable text rendering of every value.
    pub fn to_text(&self) -> Vec<Option<String>> {
        match self {
            Self::Text(values) => values.clone(),
            Self::Float(values) => values.iter().map(|v| v.map(float_text)).collect(),
            Self::Int(values) => values.iter().map(|v| v.map(|i| i.to_string())).collect(),
        }
    }

    /// Numeric view; values that do not parse become missing.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_numeric(&self) -> Vec<Option<f64>> {
        match self {
            Self::Text(values) => values
                .iter()
                .map(|v| v.as_deref().and_then(parse_number))
                .collect(),
            Self::Float(values) => values
                .iter()
                .map(|v| v.filter(|f| !f.is_nan()))
                .collect(),
            Self::Int(values) => values.iter().map(|v| v.map(|i| i as f64)).collect(),
        }
    }

    /// Integer view plus the number of numeric values that are not whole numbers.
    pub fn to_integers(&self) -> (Vec<Option<i64>>, usize) {
        if let Self::Int(values) = self {
            return (values.clone(), 0);
        }
        let mut lossy = 0;
        let integers = match self {
            Self::Text(values) => values
                .iter()
                .map(|value| {
                    let text = value.as_deref()?.trim();
                    if let Ok(parsed) = text.parse::<i64>() {
                        return Some(parsed);
                    }
                    let number = parse_number(text)?;
                    let whole = integral(number);
                    if whole.is_none() {
                        lossy += 1;
                    }
                    whole
                })
                .collect(),
            _ => self
                .to_numeric()
                .into_iter()
                .map(|value| {
                    let number = value?;
                    let whole = integral(number);
                    if whole.is_none() {
                        lossy += 1;
                    }
                    whole
                })
                .collect(),
        };
        (integers, lossy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_string_columns_and_back() {
        let column = Column::new("x".into(), vec![Some("1"), None, Some(" 2.5 ")]);
        let values = ColumnValues::from_column(&column).expect("values");
        assert_eq!(values.null_count(), 1);
        assert_eq!(values.to_numeric(), vec![Some(1.0), None, Some(2.5)]);
        let (integers, lossy) = values.to_integers();
        assert_eq!(integers, vec![Some(1), None, None]);
        assert_eq!(lossy, 1);
        let back = values.into_column("y");
        assert_eq!(back.name().as_str(), "y");
        assert_eq!(back.dtype(), &DataType::String);
    }

    #[test]
    fn integer_columns_widen_to_i64() {
        let column = Column::new("n".into(), vec![Some(3i32), None]);
        let values = ColumnValues::from_column(&column).expect("values");
        assert_eq!(values, ColumnValues::Int(vec![Some(3), None]));
        assert_eq!(values.to_text(), vec![Some("3".to_string()), None]);
    }

    #[test]
    fn pad_never_truncates() {
        let mut values = ColumnValues::Float(vec![Some(1.0)]);
        values.pad_to(3);
        assert_eq!(values, ColumnValues::Float(vec![Some(1.0), None, None]));
        values.pad_to(1);
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn numeric_parsing_rejects_blank_and_nan() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(" -4 "), Some(-4.0));
        assert_eq!(integral(4.0), Some(4));
        assert_eq!(integral(4.5), None);
        assert_eq!(float_text(150.0), "150.0");
    }
}
