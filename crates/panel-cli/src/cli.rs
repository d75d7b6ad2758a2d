//! CLI argument definitions for the panel tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use panel_map::{MatchMode, MatchOptions};
use panel_model::{ExtractionOptions, FileType, RunMode};

#[derive(Parser)]
#[command(
    name = "panel",
    version,
    about = "Survey panel builder - canonical grids, label dictionaries and panel extraction",
    long_about = "Build a long panel from per-year survey module files.\n\n\
                  Derives cross-year concepts from variable labels, writes label\n\
                  dictionaries and extracts required canonicals into one panel."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Derive concepts from labels and pivot winning codes into a grid.
    Grid(GridArgs),

    /// Union-merge groups of grid rows into their first row.
    MergeGrid(MergeGridArgs),

    /// Pick grid rows by concept name (exact, contains, regex or fuzzy).
    FilterGrid(FilterGridArgs),

    /// Write label dictionaries for the mapping.
    Dict(DictArgs),

    /// Extract required canonicals into a long panel.
    Extract(ExtractArgs),

    /// Run `dict` and then `extract` with the same inputs.
    All(AllArgs),
}

#[derive(Args)]
pub struct GridArgs {
    /// Mapping table (canonical, year, file_type, var_code, label, ...).
    #[arg(long = "mapping", value_name = "CSV", default_value = "mapping_long.csv")]
    pub mapping: PathBuf,

    /// Output directory for the grid and its reports.
    #[arg(long = "out-dir", value_name = "DIR", default_value = "out")]
    pub out_dir: PathBuf,

    /// Module that wins ties outside the age concepts.
    #[arg(long = "prefer", value_enum, ignore_case = true, default_value = "wlth")]
    pub prefer: ModuleArg,

    /// Drop rows whose label contains the word IMP.
    #[arg(long = "drop-imp")]
    pub drop_imp: bool,

    /// Years to keep, e.g. `1999,2001-2005`.
    #[arg(long = "years", value_name = "LIST")]
    pub years: Option<String>,
}

#[derive(Args)]
pub struct MergeGridArgs {
    /// Grid CSV produced by `grid`.
    #[arg(long = "file", value_name = "CSV")]
    pub file: PathBuf,

    /// Row group to merge, 1-based row numbers (repeatable), e.g. `--group "4 19"`.
    #[arg(long = "group", value_name = "ROWS", required = true)]
    pub groups: Vec<String>,

    /// Merged grid path (default: `<file stem>_merged.csv` next to the input).
    #[arg(long = "out", value_name = "CSV")]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct FilterGridArgs {
    /// Grid CSV produced by `grid` or `merge-grid`.
    #[arg(long = "grid", value_name = "CSV", default_value = "out/canonical_grid.csv")]
    pub grid: PathBuf,

    /// Concept to look up (repeatable).
    #[arg(long = "concept", value_name = "TEXT", num_args = 1..)]
    pub concepts: Vec<String>,

    /// File with one concept query per line.
    #[arg(long = "concepts-file", value_name = "TXT")]
    pub concepts_file: Option<PathBuf>,

    /// Print every concept in the grid and exit.
    #[arg(long = "list")]
    pub list: bool,

    /// Filtered grid path; `<stem>_long.csv` is written next to it.
    #[arg(long = "out", value_name = "CSV", default_value = "out/canonical_grid_study.csv")]
    pub out: PathBuf,

    /// How queries are compared with concepts.
    #[arg(long = "mode", value_enum, default_value = "auto")]
    pub mode: MatchModeArg,

    /// Compare case-sensitively.
    #[arg(long = "case-sensitive")]
    pub case_sensitive: bool,

    /// Minimum token overlap for a match.
    #[arg(long = "jaccard", value_name = "F", default_value_t = 0.40)]
    pub jaccard: f64,

    /// Minimum fuzzy ratio for a match.
    #[arg(long = "fuzzy", value_name = "F", default_value_t = 0.60)]
    pub fuzzy: f64,

    /// Matches kept per query (0 keeps all).
    #[arg(long = "top", value_name = "N", default_value_t = 3)]
    pub top: usize,

    /// Write match diagnostics to this file instead of the console.
    #[arg(long = "diagnostics", value_name = "TXT")]
    pub diagnostics: Option<PathBuf>,
}

impl FilterGridArgs {
    pub fn options(&self) -> MatchOptions {
        MatchOptions::default()
            .with_mode(self.mode.into())
            .with_case_sensitive(self.case_sensitive)
            .with_thresholds(self.jaccard, self.fuzzy)
            .with_top(self.top)
    }
}

/// Inputs shared by the mapping-driven commands.
#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Mapping table (canonical, year, file_type, var_code, label, ...).
    #[arg(long = "mapping", value_name = "CSV", default_value = "mapping_long.csv")]
    pub mapping: PathBuf,

    /// Directory containing the per-year module CSV files.
    #[arg(long = "data-dir", value_name = "DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Output directory.
    #[arg(long = "out-dir", value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Years to keep, e.g. `1999,2001-2005`.
    #[arg(long = "years", value_name = "LIST")]
    pub years: Option<String>,

    /// Modules to include.
    #[arg(
        long = "modules",
        value_enum,
        value_delimiter = ',',
        ignore_case = true,
        default_value = "fam,wlth"
    )]
    pub modules: Vec<ModuleArg>,

    /// Abort on the first ambiguity instead of recording a warning.
    #[arg(long = "strict", alias = "fail-fast")]
    pub strict: bool,
}

impl SourceArgs {
    pub fn mode(&self) -> RunMode {
        if self.strict {
            RunMode::Strict
        } else {
            RunMode::Permissive
        }
    }

    pub fn modules(&self) -> Vec<FileType> {
        self.modules.iter().copied().map(FileType::from).collect()
    }
}

#[derive(Args)]
pub struct DictArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only write the wide dictionary.
    #[arg(long = "wide-only", conflicts_with = "long_only")]
    pub wide_only: bool,

    /// Only write the long dictionary.
    #[arg(long = "long-only")]
    pub long_only: bool,
}

#[derive(Args, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Worker threads (0 or 1 runs years sequentially).
    #[arg(long = "parallel", value_name = "N", default_value_t = 1)]
    pub parallel: usize,

    /// Limit rows read per file.
    #[arg(long = "sample-rows", value_name = "N")]
    pub sample_rows: Option<usize>,

    /// Coerce canonicals to their declared dtype.
    #[arg(long = "coerce-types")]
    pub coerce_types: bool,

    /// Apply the transform DSL during extraction.
    #[arg(long = "apply-transforms")]
    pub apply_transforms: bool,

    /// Panel columns to sort by after `year`, e.g. `pid,sequence`.
    #[arg(long = "index-cols", value_name = "COLS", value_delimiter = ',')]
    pub index_cols: Vec<String>,
}

impl ExtractArgs {
    pub fn options(&self) -> ExtractionOptions {
        ExtractionOptions::new()
            .with_transforms(self.apply_transforms)
            .with_coerce_types(self.coerce_types)
            .with_sample_rows(self.sample_rows)
            .with_mode(self.source.mode())
            .with_index_cols(
                self.index_cols
                    .iter()
                    .map(|column| column.trim().to_string())
                    .filter(|column| !column.is_empty()),
            )
    }
}

#[derive(Args)]
pub struct AllArgs {
    #[command(flatten)]
    pub extract: ExtractArgs,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModuleArg {
    Fam,
    Wlth,
}

impl From<ModuleArg> for FileType {
    fn from(value: ModuleArg) -> Self {
        match value {
            ModuleArg::Fam => FileType::Fam,
            ModuleArg::Wlth => FileType::Wlth,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MatchModeArg {
    Auto,
    Exact,
    Contains,
    Regex,
    Fuzzy,
}

impl From<MatchModeArg> for MatchMode {
    fn from(value: MatchModeArg) -> Self {
        match value {
            MatchModeArg::Auto => MatchMode::Auto,
            MatchModeArg::Exact => MatchMode::Exact,
            MatchModeArg::Contains => MatchMode::Contains,
            MatchModeArg::Regex => MatchMode::Regex,
            MatchModeArg::Fuzzy => MatchMode::Fuzzy,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
