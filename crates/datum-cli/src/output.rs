//! Status line rendering for the terminal

use std::io::Write;

use colored::{ColoredString, Colorize};
use datum_core::{Attempt, Reporter, RunReport, Severity, StatusLine};

/// Prints each status line to stdout as it arrives.
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    #[cfg(test)]
    fn new(out: W) -> Self {
        Self { out }
    }
}

fn label(severity: Severity) -> ColoredString {
    let tag = format!("[{}]", severity.label());
    match severity {
        Severity::Ok => tag.green(),
        Severity::Updated => tag.cyan(),
        Severity::Stale => tag.yellow(),
        Severity::Warn => tag.yellow().dimmed(),
        Severity::Fail | Severity::Err => tag.red().bold(),
    }
}

pub fn render(line: &StatusLine) -> String {
    let mut rendered = format!("{} {}: ", label(line.severity), line.dataset_id.bold());
    if let Some(Attempt { index, total }) = line.attempt {
        rendered.push_str(&format!("source {index}/{total} failed: "));
    }
    rendered.push_str(&line.message);
    rendered
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn report(&mut self, line: StatusLine) {
        if let Err(e) = writeln!(self.out, "{}", render(&line)) {
            tracing::debug!(error = %e, "Failed to write status line");
        }
    }
}

/// One-line summary printed after a run.
pub fn summary(report: &RunReport) -> String {
    let parts: Vec<String> = [
        Severity::Ok,
        Severity::Updated,
        Severity::Stale,
        Severity::Fail,
        Severity::Err,
    ]
    .into_iter()
    .filter(|s| report.count(*s) > 0)
    .map(|s| format!("{} {}", report.count(s), s.label().to_lowercase()))
    .collect();

    if parts.is_empty() {
        "no datasets".to_string()
    } else {
        parts.join(", ")
    }
}
