use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};
use crate::options::RunMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal condition recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    pub year: Option<i32>,
    pub canonical: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            year: None,
            canonical: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    #[must_use]
    pub fn with_canonical(mut self, canonical: impl Into<String>) -> Self {
        self.canonical = Some(canonical.into());
        self
    }
}

/// Issue accumulator that applies the run mode.
///
/// In strict mode [`Diagnostics::report`] hands the error back so the caller
/// aborts; in permissive mode it is downgraded to a warning and kept.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    mode: RunMode,
    year: Option<i32>,
    issues: Vec<Issue>,
}

impl Diagnostics {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            year: None,
            issues: Vec::new(),
        }
    }

    /// Accumulator whose issues are all tagged with `year`.
    pub fn for_year(mode: RunMode, year: i32) -> Self {
        Self {
            mode,
            year: Some(year),
            issues: Vec::new(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn report(&mut self, error: PanelError) -> Result<()> {
        if self.mode.is_strict() {
            return Err(error);
        }
        let mut issue = Issue::warning(error.to_string());
        if let Some(canonical) = error.canonical() {
            issue = issue.with_canonical(canonical);
        }
        self.push(issue);
        Ok(())
    }

    pub fn push(&mut self, mut issue: Issue) {
        if issue.year.is_none() {
            issue.year = self.year;
        }
        self.issues.push(issue);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Issue::info(message));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Issue::warning(message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Issue::error(message));
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}
