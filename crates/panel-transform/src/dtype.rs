use panel_model::{ColumnDtype, PanelError, Result};
use polars::prelude::Column;

use crate::values::ColumnValues;

/// Coerces a canonical column to its declared dtype.
///
/// Non-numeric text becomes missing for the numeric dtypes. Integer coercion
/// refuses to truncate: fractional values yield [`PanelError::DtypeCoercion`]
/// and the caller decides whether to keep the column as it was.
pub fn coerce_dtype(column: &Column, dtype: ColumnDtype, canonical: &str) -> Result<Column> {
    let name = column.name().to_string();
    let values = ColumnValues::from_column(column)?;
    let coerced = match dtype {
        ColumnDtype::Int64 => {
            let (integers, lossy) = values.to_integers();
            if lossy > 0 {
                return Err(PanelError::DtypeCoercion {
                    canonical: canonical.to_string(),
                    dtype: dtype.to_string(),
                    reason: format!("{lossy} value(s) are not whole numbers"),
                });
            }
            ColumnValues::Int(integers)
        }
        ColumnDtype::Float64 => ColumnValues::Float(values.to_numeric()),
        ColumnDtype::String | ColumnDtype::Category => ColumnValues::Text(values.to_text()),
    };
    Ok(coerced.into_column(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn float_coercion_blanks_garbage() {
        let column = Column::new("income".into(), vec![Some("1.5"), Some("x"), None]);
        let out = coerce_dtype(&column, ColumnDtype::Float64, "income").expect("coerce");
        assert_eq!(out.dtype(), &DataType::Float64);
        assert_eq!(out.null_count(), 2);
    }

    #[test]
    fn int_coercion_refuses_fractions() {
        let column = Column::new("kids".into(), vec![Some("2"), Some("2.5")]);
        let error = coerce_dtype(&column, ColumnDtype::Int64, "kids").expect_err("lossy");
        assert!(error.to_string().contains("not whole numbers"));
        let column = Column::new("kids".into(), vec![Some("2"), Some("3.0")]);
        let out = coerce_dtype(&column, ColumnDtype::Int64, "kids").expect("coerce");
        assert_eq!(out.dtype(), &DataType::Int64);
    }

    #[test]
    fn category_is_stored_as_text() {
        let column = Column::new("region".into(), vec![Some(1i64), None]);
        let out = coerce_dtype(&column, ColumnDtype::Category, "region").expect("coerce");
        assert_eq!(out.dtype(), &DataType::String);
    }
}
