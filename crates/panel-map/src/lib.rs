//! Concept derivation and canonical grid building for survey mappings.

pub mod concept;
pub mod dictionary;
pub mod filter;
pub mod grid;
pub mod merge;
pub mod score;

pub use concept::{
    AGE_HEAD_CONCEPT, AGE_SPOUSE_CONCEPT, STOP_TOKENS, age_override, derive_concept,
    label_concept, normalize_label,
};
pub use dictionary::{DictionaryEntry, LabelLookup, MappingDictionary, build_dictionary};
pub use filter::{
    ConceptMatch, GridSelection, MatchMode, MatchOptions, MatchReason, fuzzy_ratio,
    match_concepts, normalize_query, select_grid_rows, token_jaccard,
};
pub use grid::{
    CONCEPT_MERGES, ConceptEntry, ConceptGrid, ConflictRow, GridOptions, GridReport, GridRow,
    LeftoverRow, RareConcept, YearCoverage, build_grid,
};
pub use merge::{GridMerge, merge_grid_rows, split_tokens};
pub use score::{CandidateScore, ConceptScorer, ScoredRow, code_frequencies, compare_candidates};
