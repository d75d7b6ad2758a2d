//! Panel extraction: canonical metadata, year planning, per-year workers and
//! the orchestrator that merges their results.

pub mod metadata;
pub mod orchestrator;
pub mod plan;
pub mod worker;

pub use metadata::{CanonicalMeta, CanonicalMetadata, build_canonical_metadata};
pub use orchestrator::{ExtractionRun, RunSummary, extract_panel, run_extraction};
pub use plan::{ExtractionPlan, YearTask, plan_extraction};
pub use worker::{YEAR_COLUMN, YearResult, process_year};
