//! The orchestration loop behind `check` and `fetch`
//!
//! Both operations load the lock state once, process datasets sequentially
//! in configured order, and save once at the end. A cancelled run returns
//! [`Error::Cancelled`] and leaves the lock file as it was.

use std::io;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tokio_util::sync::CancellationToken;

use super::status::{RunReport, RunStatus, Severity, StatusLine, Tally};
use super::Reporter;
use crate::config::{DataConfig, Dataset};
use crate::fallback::{Exhausted, FallbackCoordinator, Operation, Outcome, Resolved};
use crate::handler::HandlerRegistry;
use crate::lock::{LockEntry, LockState};
use crate::policy::{self, Action, Observation, Staleness};
use crate::{Error, Result};

/// Runtime knobs for an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Deadline for a single handler call (a fetch-and-fingerprint attempt
    /// counts as one call)
    pub op_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(60),
        }
    }
}

/// Runs checks and fetches against a handler registry.
#[derive(Debug, Clone, Copy)]
pub struct Engine<'a> {
    registry: &'a HandlerRegistry,
    options: EngineOptions,
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a HandlerRegistry, options: EngineOptions) -> Self {
        Self { registry, options }
    }

    /// Compare every dataset against its lock entry and apply its policy.
    pub async fn check(
        &self,
        config: &DataConfig,
        lock_path: &Path,
        cancel: &CancellationToken,
        reporter: &mut dyn Reporter,
    ) -> Result<RunReport> {
        let mut state = LockState::load(lock_path)?;
        let report = self.check_state(config, &mut state, cancel, reporter).await?;
        state.save(lock_path)?;
        Ok(report)
    }

    /// Fetch every dataset (or only `ids`) regardless of policy and lock state.
    pub async fn fetch(
        &self,
        config: &DataConfig,
        lock_path: &Path,
        ids: &[String],
        cancel: &CancellationToken,
        reporter: &mut dyn Reporter,
    ) -> Result<RunReport> {
        let mut state = LockState::load(lock_path)?;
        let report = self
            .fetch_state(config, &mut state, ids, cancel, reporter)
            .await?;
        state.save(lock_path)?;
        Ok(report)
    }

    /// [`Engine::check`] against an in-memory lock state.
    pub async fn check_state(
        &self,
        config: &DataConfig,
        state: &mut LockState,
        cancel: &CancellationToken,
        reporter: &mut dyn Reporter,
    ) -> Result<RunReport> {
        let pass = self.pass(cancel);
        let mut tally = Tally::new(reporter);

        for dataset in &config.datasets {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let status = pass.check_dataset(dataset, state, &mut tally).await?;
            tally.escalate(status);
        }

        state.finish_run(pass.now);
        tracing::info!(status = ?tally.summary.status, datasets = config.datasets.len(), "Check finished");
        Ok(tally.summary)
    }

    /// [`Engine::fetch`] against an in-memory lock state.
    pub async fn fetch_state(
        &self,
        config: &DataConfig,
        state: &mut LockState,
        ids: &[String],
        cancel: &CancellationToken,
        reporter: &mut dyn Reporter,
    ) -> Result<RunReport> {
        let pass = self.pass(cancel);
        let mut tally = Tally::new(reporter);

        for id in ids.iter().filter(|id| config.dataset(id).is_none()) {
            tally.report(StatusLine::new(
                Severity::Err,
                id.as_str(),
                "not found in configuration",
            ));
            tally.escalate(RunStatus::ConfigError);
        }

        let selected = config
            .datasets
            .iter()
            .filter(|d| ids.is_empty() || ids.contains(&d.id));

        for dataset in selected {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let status = pass.fetch_dataset(dataset, state, &mut tally).await?;
            tally.escalate(status);
        }

        state.finish_run(pass.now);
        tracing::info!(status = ?tally.summary.status, "Fetch finished");
        Ok(tally.summary)
    }

    fn pass<'c>(&self, cancel: &'c CancellationToken) -> Pass<'a, 'c> {
        Pass {
            coordinator: FallbackCoordinator::new(self.registry, self.options.op_timeout),
            cancel,
            now: Utc::now().trunc_subsecs(0),
        }
    }
}

/// State shared by every dataset of one run.
struct Pass<'a, 'c> {
    coordinator: FallbackCoordinator<'a>,
    cancel: &'c CancellationToken,
    now: DateTime<Utc>,
}

impl Pass<'_, '_> {
    async fn check_dataset(
        &self,
        dataset: &Dataset,
        state: &mut LockState,
        reporter: &mut dyn Reporter,
    ) -> Result<RunStatus> {
        let id = dataset.id.as_str();

        let outcome = self
            .coordinator
            .attempt(id, &dataset.sources, Operation::Fingerprint, self.cancel, reporter)
            .await?;
        let resolved = match outcome {
            Outcome::Resolved(resolved) => resolved,
            Outcome::Exhausted(exhausted) => {
                return Ok(self.record_exhausted(dataset, state, exhausted, "fingerprint", reporter));
            }
        };

        let local_hash = match hash_target(&dataset.target).await {
            Ok(hash) => hash,
            Err(e) => {
                reporter.report(StatusLine::new(Severity::Err, id, format!("local hash: {e}")));
                return Ok(RunStatus::Failure);
            }
        };

        let decision = policy::evaluate(
            &dataset.policy,
            state.get(id),
            &Observation {
                fingerprint: &resolved.fingerprint,
                local_hash: local_hash.as_deref(),
            },
            self.now,
        );

        if decision.unrecognized_policy {
            tracing::warn!(dataset = id, policy = %dataset.policy, "Unknown policy");
            reporter.report(StatusLine::new(
                Severity::Warn,
                id,
                format!("unknown policy={:?} (treating as 'fail')", dataset.policy.as_str()),
            ));
        }

        if let Some(entry) = decision.entry {
            state.put(id, entry);
        }

        let reason = decision
            .staleness
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        let status = match decision.action {
            Action::NoOp => {
                reporter.report(StatusLine::new(Severity::Ok, id, "up-to-date"));
                RunStatus::Success
            }
            Action::RecordStale => {
                reporter.report(StatusLine::new(Severity::Stale, id, reason));
                RunStatus::Success
            }
            Action::RecordDriftFailure => {
                reporter.report(StatusLine::new(Severity::Fail, id, reason));
                RunStatus::Failure
            }
            Action::Refresh => {
                self.refresh(
                    dataset,
                    state,
                    decision.staleness.as_ref(),
                    resolved.source_index,
                    reporter,
                )
                .await?
            }
        };
        Ok(status)
    }

    async fn refresh(
        &self,
        dataset: &Dataset,
        state: &mut LockState,
        staleness: Option<&Staleness>,
        winner: usize,
        reporter: &mut dyn Reporter,
    ) -> Result<RunStatus> {
        tracing::info!(
            dataset = %dataset.id,
            target = %dataset.target.display(),
            reason = ?staleness,
            "Refreshing dataset"
        );
        let verb = match staleness {
            Some(reason) => format!("refreshed ({reason})"),
            None => "refreshed".to_string(),
        };
        self.fetch_into(dataset, state, winner, &verb, reporter).await
    }

    async fn fetch_dataset(
        &self,
        dataset: &Dataset,
        state: &mut LockState,
        reporter: &mut dyn Reporter,
    ) -> Result<RunStatus> {
        tracing::info!(
            dataset = %dataset.id,
            target = %dataset.target.display(),
            "Fetching dataset"
        );
        self.fetch_into(dataset, state, 0, "fetched", reporter).await
    }

    /// Fetch-and-fingerprint through the coordinator and record the outcome.
    ///
    /// Sources before `start` are skipped: a refresh begins at the source
    /// whose fingerprint triggered it.
    async fn fetch_into(
        &self,
        dataset: &Dataset,
        state: &mut LockState,
        start: usize,
        verb: &str,
        reporter: &mut dyn Reporter,
    ) -> Result<RunStatus> {
        let id = dataset.id.as_str();
        let op = Operation::FetchAndFingerprint {
            dest: &dataset.target,
        };

        let resolved = match self
            .coordinator
            .attempt_from(id, &dataset.sources, start, op, self.cancel, reporter)
            .await?
        {
            Outcome::Resolved(resolved) => resolved,
            Outcome::Exhausted(exhausted) => {
                return Ok(self.record_exhausted(dataset, state, exhausted, "fetch", reporter));
            }
        };

        let hash = match hash_target(&dataset.target).await {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                reporter.report(StatusLine::new(
                    Severity::Err,
                    id,
                    format!("fetch did not produce {}", dataset.target.display()),
                ));
                return Ok(RunStatus::Failure);
            }
            Err(e) => {
                reporter.report(StatusLine::new(Severity::Err, id, format!("local hash: {e}")));
                return Ok(RunStatus::Failure);
            }
        };

        state.put(id, LockEntry::accepted(&resolved.fingerprint, hash, self.now));
        reporter.report(StatusLine::new(
            Severity::Updated,
            id,
            updated_message(verb, &resolved, dataset.sources.len()),
        ));
        Ok(RunStatus::Success)
    }

    fn record_exhausted(
        &self,
        dataset: &Dataset,
        state: &mut LockState,
        exhausted: Exhausted,
        op: &str,
        reporter: &mut dyn Reporter,
    ) -> RunStatus {
        let id = dataset.id.as_str();

        if exhausted.all_unresolved() {
            reporter.report(StatusLine::new(Severity::Err, id, exhausted.to_string()));
            return RunStatus::ConfigError;
        }

        tracing::warn!(dataset = id, error = %exhausted, "No source reachable");
        reporter.report(StatusLine::new(Severity::Err, id, format!("{op}: {exhausted}")));
        state.mark_inaccessible(id, exhausted.to_string(), self.now);
        RunStatus::Failure
    }
}

fn updated_message(verb: &str, resolved: &Resolved, total: usize) -> String {
    if total > 1 {
        format!(
            "{verb} from source {}/{total} ({})",
            resolved.source_index + 1,
            resolved.fingerprint
        )
    } else {
        format!("{verb} ({})", resolved.fingerprint)
    }
}

/// Checksum of the materialized target, `None` when it does not exist.
async fn hash_target(path: &Path) -> io::Result<Option<String>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || match datum_fs::compute_file_checksum(&path) {
        Ok(hash) => Ok(Some(hash)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    })
    .await
    .map_err(io::Error::other)?
}
