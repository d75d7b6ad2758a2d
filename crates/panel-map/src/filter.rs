//! Permissive lookup of grid rows by concept name.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use rapidfuzz::fuzz;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::grid::ConceptGrid;

/// Word-level rewrites applied to queries and concepts alike.
const QUERY_SYNONYMS: &[(&str, &str)] = &[
    ("annuity ira", "ira"),
    ("annuities", "ira"),
    ("iras", "ira"),
    ("stock market", "stocks"),
    ("stock", "stocks"),
    ("vehicle", "vehicles"),
    ("vehicule", "vehicles"),
    ("home equity", "home_equity"),
    ("checking saving", "checking_savings"),
];

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/_\-]+").expect("valid separator regex"));
static SPACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static QUERY_SYNONYM_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    QUERY_SYNONYMS
        .iter()
        .map(|(from, to)| {
            let pattern = format!(r"\b{}\b", regex::escape(from));
            (Regex::new(&pattern).expect("valid query synonym regex"), *to)
        })
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Exact, then contains, token overlap and fuzzy ratio.
    #[default]
    Auto,
    Exact,
    Contains,
    Regex,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Exact,
    Regex,
    Contains,
    Jaccard,
    Fuzzy,
}

impl MatchReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "EXACT",
            Self::Regex => "REGEX",
            Self::Contains => "CONTAINS",
            Self::Jaccard => "JACCARD",
            Self::Fuzzy => "FUZZY",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    pub mode: MatchMode,
    pub case_sensitive: bool,
    /// Minimum token Jaccard overlap.
    pub jaccard_threshold: f64,
    /// Minimum normalized string ratio.
    pub fuzzy_threshold: f64,
    /// Matches kept per query; 0 keeps all.
    pub top: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            mode: MatchMode::Auto,
            case_sensitive: false,
            jaccard_threshold: 0.40,
            fuzzy_threshold: 0.60,
            top: 3,
        }
    }
}

impl MatchOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_case_sensitive(mut self, enable: bool) -> Self {
        self.case_sensitive = enable;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, jaccard: f64, fuzzy: f64) -> Self {
        self.jaccard_threshold = jaccard;
        self.fuzzy_threshold = fuzzy;
        self
    }

    #[must_use]
    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConceptMatch {
    pub concept: String,
    pub score: f64,
    pub reason: MatchReason,
}

/// Rows picked for a set of queries.
#[derive(Debug, Clone, Default)]
pub struct GridSelection {
    /// Matched rows, unique, in the order the queries found them.
    pub grid: ConceptGrid,
    /// One line per match plus `[MISS]` lines.
    pub diagnostics: Vec<String>,
    /// Queries that matched nothing.
    pub missing: Vec<String>,
}

impl GridSelection {
    pub fn long_header(&self) -> Vec<String> {
        vec!["concept".to_string(), "year".to_string(), "var_code".to_string()]
    }

    /// One record per (row, year) cell, empty cells included.
    pub fn long_records(&self) -> Vec<Vec<String>> {
        self.grid
            .rows
            .iter()
            .flat_map(|row| {
                self.grid.years.iter().zip(&row.cells).map(|(year, cell)| {
                    vec![
                        row.concept.clone(),
                        year.to_string(),
                        cell.clone().unwrap_or_default(),
                    ]
                })
            })
            .collect()
    }
}

/// Trims, optionally lowercases, turns `/ _ -` into spaces and applies the
/// query synonyms.
pub fn normalize_query(text: &str, case_sensitive: bool) -> String {
    let trimmed = text.trim();
    let text = if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    };
    let text = SEPARATOR_RE.replace_all(&text, " ");
    let mut text = SPACES_RE.replace_all(&text, " ").trim().to_string();
    for (pattern, replacement) in QUERY_SYNONYM_RES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text
}

fn token_set(text: &str) -> BTreeSet<String> {
    normalize_query(text, false)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard overlap of the normalized token sets.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let (left, right) = (token_set(a), token_set(b));
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Normalized indel ratio in `0..=1` of the normalized strings.
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    let (left, right) = (normalize_query(a, false), normalize_query(b, false));
    fuzz::ratio(left.chars(), right.chars())
}

/// Best score for one candidate, or `None` when nothing clears its threshold.
fn score_candidate(
    query: &str,
    pattern: Option<&Regex>,
    candidate: &str,
    options: &MatchOptions,
) -> Option<(f64, MatchReason)> {
    let mode = options.mode;
    if mode == MatchMode::Regex {
        return pattern
            .filter(|re| re.is_match(candidate))
            .map(|_| (1.0, MatchReason::Regex));
    }
    let normalized = normalize_query(candidate, options.case_sensitive);
    if matches!(mode, MatchMode::Exact | MatchMode::Auto) && normalized == query {
        return Some((1.0, MatchReason::Exact));
    }

    let mut best: Option<(f64, MatchReason)> = None;
    let mut offer = |score: f64, reason: MatchReason| {
        if best.is_none_or(|(current, _)| score > current) {
            best = Some((score, reason));
        }
    };
    if matches!(mode, MatchMode::Contains | MatchMode::Auto) && normalized.contains(query) {
        let score = query.chars().count() as f64 / normalized.chars().count().max(1) as f64;
        offer(score, MatchReason::Contains);
    }
    if matches!(mode, MatchMode::Fuzzy | MatchMode::Auto) {
        let overlap = token_jaccard(query, &normalized);
        if overlap >= options.jaccard_threshold {
            offer(overlap, MatchReason::Jaccard);
        }
        let ratio = fuzzy_ratio(query, &normalized);
        if ratio >= options.fuzzy_threshold {
            offer(ratio, MatchReason::Fuzzy);
        }
    }
    best
}

fn compile_pattern(query: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(query)
        .case_insensitive(!case_sensitive)
        .build()
}

/// Ranks `candidates` against `query`, best first; ties keep candidate order.
///
/// In regex mode an invalid pattern matches nothing.
pub fn match_concepts(query: &str, candidates: &[&str], options: &MatchOptions) -> Vec<ConceptMatch> {
    let pattern = if options.mode == MatchMode::Regex {
        match compile_pattern(query, options.case_sensitive) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(query, error = %err, "invalid concept pattern");
                None
            }
        }
    } else {
        None
    };
    let normalized = normalize_query(query, options.case_sensitive);

    let mut seen = BTreeSet::new();
    let mut ranked: Vec<ConceptMatch> = candidates
        .iter()
        .filter(|candidate| seen.insert(**candidate))
        .filter_map(|candidate| {
            score_candidate(&normalized, pattern.as_ref(), candidate, options).map(
                |(score, reason)| ConceptMatch {
                    concept: (*candidate).to_string(),
                    score,
                    reason,
                },
            )
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    if options.top > 0 {
        ranked.truncate(options.top);
    }
    ranked
}

/// Selects grid rows for every query, keeping the grid's year columns.
pub fn select_grid_rows(grid: &ConceptGrid, queries: &[String], options: &MatchOptions) -> GridSelection {
    let concepts: Vec<&str> = grid.rows.iter().map(|row| row.concept.as_str()).collect();
    let mut selection = GridSelection::default();
    let mut ordered: Vec<String> = Vec::new();

    for query in queries {
        let matches = match_concepts(query, &concepts, options);
        if matches.is_empty() {
            selection.missing.push(query.clone());
            selection.diagnostics.push(format!("[MISS] {query}"));
            continue;
        }
        for found in matches {
            selection.diagnostics.push(format!(
                "[{} {:.2}] {query} -> {}",
                found.reason.as_str(),
                found.score,
                found.concept
            ));
            if !ordered.contains(&found.concept) {
                ordered.push(found.concept);
            }
        }
    }

    selection.grid = ConceptGrid {
        years: grid.years.clone(),
        rows: ordered
            .iter()
            .flat_map(|concept| grid.rows.iter().filter(move |row| &row.concept == concept))
            .cloned()
            .collect(),
    };
    debug!(
        queries = queries.len(),
        rows = selection.grid.rows.len(),
        missing = selection.missing.len(),
        "selected grid rows"
    );
    selection
}
