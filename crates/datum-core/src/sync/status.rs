//! Run status lattice and the user-facing status stream
//!
//! Every dataset produces exactly one terminal [`StatusLine`] (`OK`,
//! `UPDATED`, `STALE`, `FAIL` or `ERR`); `WARN` lines may precede it. The
//! overall [`RunStatus`] is the maximum of the statuses contributed by each
//! dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Overall result of a run, ordered from best to worst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    #[default]
    Success,
    /// Drift under `fail`, or a dataset whose sources were all unreachable
    Failure,
    /// Bad configuration: unknown handler, unknown dataset id, ...
    ConfigError,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
            RunStatus::ConfigError => 2,
        }
    }

    /// Raise this status to at least `other`.
    pub fn escalate(&mut self, other: RunStatus) {
        *self = (*self).max(other);
    }
}

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Ok,
    Updated,
    Stale,
    Fail,
    Warn,
    Err,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Updated => "UPDATED",
            Severity::Stale => "STALE",
            Severity::Fail => "FAIL",
            Severity::Warn => "WARN",
            Severity::Err => "ERR",
        }
    }

    /// True for severities that end a dataset's processing.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Severity::Warn)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Position of a source within a dataset's fallback list (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub index: usize,
    pub total: usize,
}

/// One user-facing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    pub severity: Severity,
    pub dataset_id: String,
    pub message: String,
    pub attempt: Option<Attempt>,
}

impl StatusLine {
    pub fn new(severity: Severity, dataset_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            dataset_id: dataset_id.into(),
            message: message.into(),
            attempt: None,
        }
    }

    pub fn with_attempt(mut self, index: usize, total: usize) -> Self {
        self.attempt = Some(Attempt { index, total });
        self
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: ", self.severity, self.dataset_id)?;
        if let Some(Attempt { index, total }) = self.attempt {
            write!(f, "source {index}/{total} failed: ")?;
        }
        f.write_str(&self.message)
    }
}

/// Receives status lines as they happen.
pub trait Reporter: Send {
    fn report(&mut self, line: StatusLine);
}

impl Reporter for Vec<StatusLine> {
    fn report(&mut self, line: StatusLine) {
        self.push(line);
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub counts: BTreeMap<Severity, usize>,
}

impl RunReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.counts.get(&severity).copied().unwrap_or(0)
    }
}

/// Forwards lines to an inner reporter while tallying severities.
pub(crate) struct Tally<'r> {
    inner: &'r mut dyn Reporter,
    pub(crate) summary: RunReport,
}

impl<'r> Tally<'r> {
    pub(crate) fn new(inner: &'r mut dyn Reporter) -> Self {
        Self {
            inner,
            summary: RunReport::default(),
        }
    }

    pub(crate) fn escalate(&mut self, status: RunStatus) {
        self.summary.status.escalate(status);
    }
}

impl Reporter for Tally<'_> {
    fn report(&mut self, line: StatusLine) {
        *self.summary.counts.entry(line.severity).or_default() += 1;
        self.inner.report(line);
    }
}
