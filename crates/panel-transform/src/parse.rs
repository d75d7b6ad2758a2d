//! Parser for transform cells such as `sum_non_na; na_codes:[9998|9999]; clip:[0,]`.

use std::sync::LazyLock;

use panel_model::{Diagnostics, PanelError, Result};
use regex::Regex;

use crate::dsl::{DuplicateStrategy, NaCode, TransformOperation, TransformSpec};

static TOKEN_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*;\s*").expect("valid transform split regex"));
static NA_CODES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^na_codes\s*:(.*)$").expect("valid na_codes regex"));
static CLIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^clip\s*:\s*\[?(?P<min>[^,\]]*),(?P<max>[^\]]*)\]?\s*$")
        .expect("valid clip regex")
});
static WINSOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^winsor\s*:\s*\[?(?P<p>[^\]]*)\]?\s*$").expect("valid winsor regex")
});

/// Parses one transform cell for `canonical`.
///
/// Malformed tokens go through `diagnostics`: strict runs fail on them,
/// permissive runs drop the token and keep a warning.
pub fn parse_transform(
    raw: &str,
    canonical: &str,
    diagnostics: &mut Diagnostics,
) -> Result<TransformSpec> {
    let mut spec = TransformSpec::default();
    let trimmed = raw.trim();
    if trimmed.is_empty() || matches!(trimmed.to_lowercase().as_str(), "nan" | "none") {
        return Ok(spec);
    }

    for token in TOKEN_SPLIT_RE.split(trimmed) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match parse_token(token) {
            Ok(Parsed::Strategy(strategy)) => {
                if let Some(conflict) = spec.set_strategy(strategy) {
                    diagnostics.report(PanelError::TransformParse {
                        canonical: canonical.to_string(),
                        token: token.to_string(),
                        reason: format!("conflicts with duplicate strategy {}", conflict.kept),
                    })?;
                }
            }
            Ok(Parsed::Operation(operation)) => {
                spec.push(operation);
            }
            Err(reason) => diagnostics.report(PanelError::TransformParse {
                canonical: canonical.to_string(),
                token: token.to_string(),
                reason,
            })?,
        }
    }
    Ok(spec)
}

enum Parsed {
    Strategy(DuplicateStrategy),
    Operation(TransformOperation),
}

fn parse_token(token: &str) -> std::result::Result<Parsed, String> {
    let keyword = token.to_lowercase();
    if let Some(strategy) = DuplicateStrategy::from_keyword(&keyword) {
        return Ok(Parsed::Strategy(strategy));
    }
    if let Some(operation) = TransformOperation::from_keyword(&keyword) {
        return Ok(Parsed::Operation(operation));
    }
    if let Some(captures) = NA_CODES_RE.captures(token) {
        let payload = captures[1].trim().trim_matches(|c| c == '[' || c == ']');
        let codes: Vec<NaCode> = payload
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty() && !part.eq_ignore_ascii_case("nan"))
            .map(NaCode::parse)
            .collect();
        if codes.is_empty() {
            return Err("lists no codes".to_string());
        }
        return Ok(Parsed::Operation(TransformOperation::NaCodes { codes }));
    }
    if let Some(captures) = CLIP_RE.captures(token) {
        let min = parse_bound(&captures["min"])?;
        let max = parse_bound(&captures["max"])?;
        if let (Some(low), Some(high)) = (min, max) {
            if low > high {
                return Err(format!("has lower bound {low} above upper bound {high}"));
            }
        }
        return Ok(Parsed::Operation(TransformOperation::Clip { min, max }));
    }
    if let Some(captures) = WINSOR_RE.captures(token) {
        let raw = captures["p"].trim();
        let p = raw
            .parse::<f64>()
            .map_err(|_| format!("has non-numeric quantile '{raw}'"))?;
        if !(p > 0.0 && p < 0.5) {
            return Err(format!("needs 0 < p < 0.5, got {raw}"));
        }
        return Ok(Parsed::Operation(TransformOperation::Winsor { p }));
    }
    Err("is not a recognized transform".to_string())
}

fn parse_bound(raw: &str) -> std::result::Result<Option<f64>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(format!("has invalid bound '{trimmed}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_model::{RunMode, Severity};

    fn permissive(raw: &str) -> (TransformSpec, Diagnostics) {
        let mut diagnostics = Diagnostics::new(RunMode::Permissive);
        let spec = parse_transform(raw, "income", &mut diagnostics).expect("permissive parse");
        (spec, diagnostics)
    }

    #[test]
    fn parses_every_token_kind() {
        let (spec, diagnostics) = permissive(
            "SUM_NON_NA; strip ;na_codes:[9998| 9999 |nan|DK]; clip:[0,]; winsor:[0.01]; to_float",
        );
        assert!(diagnostics.issues().is_empty());
        assert_eq!(spec.duplicate_strategy, Some(DuplicateStrategy::SumNonNa));
        assert_eq!(
            spec.operations,
            vec![
                TransformOperation::Strip,
                TransformOperation::NaCodes {
                    codes: vec![
                        NaCode::Int(9998),
                        NaCode::Int(9999),
                        NaCode::Text("DK".to_string()),
                    ],
                },
                TransformOperation::Clip {
                    min: Some(0.0),
                    max: None,
                },
                TransformOperation::Winsor { p: 0.01 },
                TransformOperation::ToFloat,
            ]
        );
    }

    #[test]
    fn blank_cells_are_empty_specs() {
        for raw in ["", "  ", "nan", "None"] {
            let (spec, diagnostics) = permissive(raw);
            assert!(spec.is_empty());
            assert!(diagnostics.issues().is_empty());
        }
    }

    #[test]
    fn permissive_drops_bad_tokens_with_warnings() {
        let (spec, diagnostics) =
            permissive("first_non_na; max_non_na; winsor:[0.7]; explode; clip:[a,1]; upper");
        assert_eq!(spec.duplicate_strategy, Some(DuplicateStrategy::FirstNonNa));
        assert_eq!(spec.operations, vec![TransformOperation::Upper]);
        assert_eq!(diagnostics.issues().len(), 4);
        assert!(diagnostics
            .issues()
            .iter()
            .all(|issue| issue.severity == Severity::Warning));
        assert_eq!(diagnostics.issues()[0].canonical.as_deref(), Some("income"));
    }

    #[test]
    fn strict_rejects_unknown_tokens() {
        let mut diagnostics = Diagnostics::new(RunMode::Strict);
        let result = parse_transform("to_int; log", "income", &mut diagnostics);
        assert!(matches!(
            result,
            Err(PanelError::TransformParse { ref token, .. }) if token == "log"
        ));
    }

    #[test]
    fn repeated_tokens_are_deduplicated() {
        let (spec, _) = permissive("to_int; to_int; clip:[0,10]; clip:[0,10]");
        assert_eq!(spec.operations.len(), 2);
    }
}
