//! Typed representation of the per-canonical transform language.

use std::fmt;

use serde::Serialize;

use crate::values::float_text;

/// Sentinel literal that marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NaCode {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NaCode {
    /// Parses a literal as float when it looks like one, else as integer,
    /// falling back to the raw text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let lowered = raw.to_lowercase();
        if lowered.contains('.') || lowered.contains('e') {
            if let Ok(value) = raw.parse::<f64>() {
                return Self::Float(value);
            }
        } else if let Ok(value) = raw.parse::<i64>() {
            return Self::Int(value);
        }
        Self::Text(raw.to_string())
    }

    /// Text form compared against the string rendering of a value.
    pub fn text(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Float(value) => float_text(*value),
            Self::Text(value) => value.clone(),
        }
    }

    /// Native numeric equality; text codes never match numbers natively.
    pub fn matches_number(&self, value: f64) -> bool {
        match self {
            Self::Int(code) => value == *code as f64,
            Self::Float(code) => value == *code,
            Self::Text(_) => false,
        }
    }
}

impl fmt::Display for NaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// One cleaning step applied to a canonical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOperation {
    ToInt,
    ToFloat,
    Strip,
    Lower,
    Upper,
    NaBlankToNan,
    NaCodes { codes: Vec<NaCode> },
    Clip { min: Option<f64>, max: Option<f64> },
    Winsor { p: f64 },
}

impl TransformOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToInt => "to_int",
            Self::ToFloat => "to_float",
            Self::Strip => "strip",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::NaBlankToNan => "na_blank_to_nan",
            Self::NaCodes { .. } => "na_codes",
            Self::Clip { .. } => "clip",
            Self::Winsor { .. } => "winsor",
        }
    }

    /// Zero-parameter operation named by `keyword`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "to_int" => Some(Self::ToInt),
            "to_float" => Some(Self::ToFloat),
            "strip" => Some(Self::Strip),
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            "na_blank_to_nan" => Some(Self::NaBlankToNan),
            _ => None,
        }
    }
}

impl fmt::Display for TransformOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NaCodes { codes } => {
                let codes: Vec<String> = codes.iter().map(NaCode::text).collect();
                write!(f, "na_codes:[{}]", codes.join("|"))
            }
            Self::Clip { min, max } => {
                let bound = |value: &Option<f64>| value.map(float_text).unwrap_or_default();
                write!(f, "clip:[{},{}]", bound(min), bound(max))
            }
            Self::Winsor { p } => write!(f, "winsor:[{}]", float_text(*p)),
            other => f.write_str(other.name()),
        }
    }
}

/// Policy for collapsing several source columns of one canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStrategy {
    FirstNonNa,
    SumNonNa,
    MaxNonNa,
}

impl DuplicateStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstNonNa => "first_non_na",
            Self::SumNonNa => "sum_non_na",
            Self::MaxNonNa => "max_non_na",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "first_non_na" => Some(Self::FirstNonNa),
            "sum_non_na" => Some(Self::SumNonNa),
            "max_non_na" => Some(Self::MaxNonNa),
            _ => None,
        }
    }
}

impl fmt::Display for DuplicateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two rows declared different duplicate strategies; the first one is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyConflict {
    pub kept: DuplicateStrategy,
    pub ignored: DuplicateStrategy,
}

/// Parsed transform cell(s) for one canonical.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformSpec {
    pub operations: Vec<TransformOperation>,
    pub duplicate_strategy: Option<DuplicateStrategy>,
}

impl TransformSpec {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.duplicate_strategy.is_none()
    }

    /// Appends `operation` unless an identical one is already present.
    pub fn push(&mut self, operation: TransformOperation) -> bool {
        if self.operations.contains(&operation) {
            return false;
        }
        self.operations.push(operation);
        true
    }

    /// Sets the strategy if none is set yet.
    pub fn set_strategy(&mut self, strategy: DuplicateStrategy) -> Option<StrategyConflict> {
        match self.duplicate_strategy {
            None => {
                self.duplicate_strategy = Some(strategy);
                None
            }
            Some(kept) if kept == strategy => None,
            Some(kept) => Some(StrategyConflict {
                kept,
                ignored: strategy,
            }),
        }
    }

    /// Folds `other` into `self`: operations are unioned in first-seen order
    /// and the first strategy wins.
    pub fn merge(&mut self, other: &TransformSpec) -> Option<StrategyConflict> {
        for operation in &other.operations {
            self.push(operation.clone());
        }
        other
            .duplicate_strategy
            .and_then(|strategy| self.set_strategy(strategy))
    }
}

impl fmt::Display for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens: Vec<String> = Vec::new();
        if let Some(strategy) = self.duplicate_strategy {
            tokens.push(strategy.to_string());
        }
        tokens.extend(self.operations.iter().map(ToString::to_string));
        f.write_str(&tokens.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn na_code_literals() {
        assert_eq!(NaCode::parse("9999"), NaCode::Int(9999));
        assert_eq!(NaCode::parse("-1.5"), NaCode::Float(-1.5));
        assert_eq!(NaCode::parse("1e3"), NaCode::Float(1000.0));
        assert_eq!(NaCode::parse("DK"), NaCode::Text("DK".to_string()));
        assert_eq!(NaCode::parse("none"), NaCode::Text("none".to_string()));
        assert_eq!(NaCode::Float(9.0).text(), "9.0");
    }

    #[test]
    fn merge_unions_operations_and_keeps_first_strategy() {
        let mut spec = TransformSpec {
            operations: vec![TransformOperation::Strip, TransformOperation::ToFloat],
            duplicate_strategy: Some(DuplicateStrategy::SumNonNa),
        };
        let other = TransformSpec {
            operations: vec![
                TransformOperation::ToFloat,
                TransformOperation::Clip {
                    min: Some(0.0),
                    max: None,
                },
            ],
            duplicate_strategy: Some(DuplicateStrategy::MaxNonNa),
        };
        let conflict = spec.merge(&other);
        assert_eq!(
            conflict,
            Some(StrategyConflict {
                kept: DuplicateStrategy::SumNonNa,
                ignored: DuplicateStrategy::MaxNonNa,
            })
        );
        assert_eq!(spec.operations.len(), 3);
        assert_eq!(spec.duplicate_strategy, Some(DuplicateStrategy::SumNonNa));
        assert_eq!(spec.to_string(), "sum_non_na; strip; to_float; clip:[0.0,]");
    }

    #[test]
    fn merging_into_itself_is_idempotent() {
        let mut spec = TransformSpec {
            operations: vec![
                TransformOperation::NaCodes {
                    codes: vec![NaCode::Int(9999)],
                },
                TransformOperation::Winsor { p: 0.05 },
            ],
            duplicate_strategy: Some(DuplicateStrategy::FirstNonNa),
        };
        let copy = spec.clone();
        assert_eq!(spec.merge(&copy), None);
        assert_eq!(spec, copy);
    }
}
