//! Label normalization and concept derivation.
//!
//! A free-text variable label is reduced to a concept key that clusters
//! year-specific variable codes describing the same quantity. Age labels are
//! routed through a dedicated override because their wording drifts too much
//! across waves to normalize generically.

use std::sync::LazyLock;

use regex::Regex;

/// Concept every head-of-household age label resolves to.
pub const AGE_HEAD_CONCEPT: &str = "demographics :: age_head";
/// Concept every spouse/partner age label resolves to.
pub const AGE_SPOUSE_CONCEPT: &str = "demographics :: age_spouse";
/// Prefix shared by the age override concepts.
pub const AGE_CONCEPT_PREFIX: &str = "demographics :: age_";
/// Separator between the category and the normalized label.
pub const CONCEPT_SEPARATOR: &str = " :: ";
/// Normalized labels shorter than this are treated as failed derivations.
pub const MIN_CONCEPT_CHARS: usize = 3;

/// Tokens carrying no concept information.
pub const STOP_TOKENS: &[&str] = &[
    "imp",
    "acc",
    "wtr",
    "whether",
    "ever",
    "any",
    "of",
    "the",
    "a",
    "an",
    "and",
    "or",
    "to",
    "in",
    "for",
    "by",
    "head",
    "hh",
    "household",
];

/// Phrase rewrites applied in order with word boundaries.
const SYNONYMS: &[(&str, &str)] = &[
    ("annuity/ira", "ira"),
    ("iras", "ira"),
    ("stock market", "stocks"),
    ("stock", "stocks"),
    ("wealth without equity", "wealth_wo_equity"),
    ("wealth w/o equity", "wealth_wo_equity"),
    ("home equity", "home_equity"),
    ("other asset", "other_assets"),
    ("other assets", "other_assets"),
    ("vehicle", "vehicles"),
    ("vehicles", "vehicles"),
    ("balance", "value"),
    ("account", "acct"),
    ("accounts", "acct"),
    ("mortgages", "mortgage"),
];

static WAVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(W\d+\)").expect("valid wave regex"));
static YEAR2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2}\b").expect("valid two-digit year regex"));
static YEAR4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid four-digit year regex"));
static BRACKETS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\](){}]").expect("valid bracket regex"));
static PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s/]+").expect("valid punctuation regex"));
static WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid digit token regex"));

static SYNONYM_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SYNONYMS
        .iter()
        .map(|(from, to)| {
            let pattern = format!(r"\b{}\b", regex::escape(from));
            (Regex::new(&pattern).expect("valid synonym regex"), *to)
        })
        .collect()
});

const HEAD_WORDS: &str = "head|reference person|ref person|respondent|hd";
const SPOUSE_WORDS: &str = "spouse|wife|husband|partner";

fn age_patterns(words: &str) -> Vec<Regex> {
    let bare = words.replace("|hd", "");
    [
        format!(r"\bage\b.*\b({words})\b"),
        format!(r"\b({words})\b.*\bage\b"),
        format!(r"\bage of ({bare})\b"),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid age regex"))
    .collect()
}

static AGE_HEAD_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| age_patterns(HEAD_WORDS));
static AGE_SPOUSE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| age_patterns(SPOUSE_WORDS));

/// Cleans a label down to lowercase words, before stopword removal.
pub fn clean_label(label: &str) -> String {
    let mut text = label.trim().to_lowercase();
    for pattern in [&*WAVE_RE, &*YEAR2_RE, &*YEAR4_RE, &*BRACKETS_RE, &*PUNCT_RE] {
        text = pattern.replace_all(&text, " ").into_owned();
    }
    collapse_whitespace(&text)
}

/// Full normalization: clean, drop stopwords and numeric tokens, apply synonyms.
pub fn normalize_label(label: &str) -> String {
    let cleaned = clean_label(label);
    let kept: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| !STOP_TOKENS.contains(token) && !DIGITS_RE.is_match(token))
        .collect();
    let mut text = kept.join(" ");
    for (pattern, replacement) in SYNONYM_RES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    collapse_whitespace(&text)
}

/// Age override evaluated on the raw label. Head patterns win over spouse ones.
pub fn age_override(label: &str) -> Option<&'static str> {
    let lowered = label.to_lowercase();
    if AGE_HEAD_RES.iter().any(|re| re.is_match(&lowered)) {
        return Some(AGE_HEAD_CONCEPT);
    }
    if AGE_SPOUSE_RES.iter().any(|re| re.is_match(&lowered)) {
        return Some(AGE_SPOUSE_CONCEPT);
    }
    None
}

/// Concept base for a label: the age override when it applies, else the
/// normalized label.
pub fn label_concept(label: &str) -> String {
    match age_override(label) {
        Some(concept) => concept.to_string(),
        None => normalize_label(label),
    }
}

/// Whether `concept` is one of the fixed age keys.
pub fn is_age_concept(concept: &str) -> bool {
    concept.starts_with(AGE_CONCEPT_PREFIX)
}

/// Derives the category-qualified concept key for a mapping row.
///
/// Returns `None` when the normalized label is too short to be trusted; such
/// rows belong in the leftovers report.
pub fn derive_concept(label: &str, category: &str) -> Option<String> {
    let base = label_concept(label);
    if base.chars().count() < MIN_CONCEPT_CHARS {
        return None;
    }
    if is_age_concept(&base) {
        return Some(base);
    }
    let category = category.trim().to_lowercase();
    if category.is_empty() {
        Some(base)
    } else {
        Some(format!("{category}{CONCEPT_SEPARATOR}{base}"))
    }
}

fn collapse_whitespace(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}
