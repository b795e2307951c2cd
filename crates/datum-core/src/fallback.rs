//! Ordered fallback across a dataset's sources
//!
//! Sources are tried strictly in configured order. The first success wins
//! and later sources are never touched; a failure is reported as a `WARN`
//! line only when another candidate remains to be tried.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handler::{HandlerRegistry, HandlerResult, OpContext, SourceHandler};
use crate::source::SourceSpec;
use crate::sync::{Reporter, Severity, StatusLine};
use crate::{Error, Result};

/// What to do with each candidate source.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Fingerprint,
    /// Fetch into `dest`, then fingerprint the same source
    FetchAndFingerprint { dest: &'a Path },
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Operation::Fingerprint => "fingerprint",
            Operation::FetchAndFingerprint { .. } => "fetch",
        }
    }
}

/// Why one candidate failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("unknown source.type={tag:?}")]
    UnknownHandler { tag: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub fingerprint: String,
    /// Zero-based index of the winning source
    pub source_index: usize,
    /// Number of candidates tried, including the winner
    pub attempts: usize,
}

#[derive(Debug)]
pub struct Exhausted {
    pub attempts: usize,
    pub last_error: AttemptError,
    /// Candidates whose type tag had no registered handler
    pub unresolved: usize,
}

impl Exhausted {
    /// True when no candidate had a registered handler.
    pub fn all_unresolved(&self) -> bool {
        self.unresolved == self.attempts
    }
}

impl std::fmt::Display for Exhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.attempts == 1 {
            write!(f, "{}", self.last_error)
        } else {
            write!(
                f,
                "all {} sources failed; last error: {}",
                self.attempts, self.last_error
            )
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Resolved(Resolved),
    Exhausted(Exhausted),
}

/// Runs an [`Operation`] against a list of sources until one succeeds.
#[derive(Debug, Clone, Copy)]
pub struct FallbackCoordinator<'a> {
    registry: &'a HandlerRegistry,
    op_timeout: Duration,
}

impl<'a> FallbackCoordinator<'a> {
    pub fn new(registry: &'a HandlerRegistry, op_timeout: Duration) -> Self {
        Self {
            registry,
            op_timeout,
        }
    }

    /// Try each source in order.
    ///
    /// Returns `Err(Error::Cancelled)` if `cancel` fires before or during an
    /// attempt; the remaining candidates are not tried.
    pub async fn attempt(
        &self,
        dataset_id: &str,
        sources: &[SourceSpec],
        op: Operation<'_>,
        cancel: &CancellationToken,
        reporter: &mut dyn Reporter,
    ) -> Result<Outcome> {
        self.attempt_from(dataset_id, sources, 0, op, cancel, reporter)
            .await
    }

    /// Like [`attempt`](Self::attempt), but skip the sources before `start`.
    ///
    /// Indices in the outcome and in warnings still refer to the full list.
    pub async fn attempt_from(
        &self,
        dataset_id: &str,
        sources: &[SourceSpec],
        start: usize,
        op: Operation<'_>,
        cancel: &CancellationToken,
        reporter: &mut dyn Reporter,
    ) -> Result<Outcome> {
        let total = sources.len();
        let mut last_error = None;
        let mut unresolved = 0;

        for (index, source) in sources.iter().enumerate().skip(start) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            tracing::debug!(
                dataset = dataset_id,
                source = %source,
                attempt = index + 1,
                total,
                op = op.name(),
                "Trying source"
            );

            let error = match self.registry.resolve(&source.kind) {
                Err(_) => {
                    unresolved += 1;
                    AttemptError::UnknownHandler {
                        tag: source.kind.clone(),
                    }
                }
                Ok(handler) => {
                    let ctx = OpContext::new(cancel, self.op_timeout);
                    match invoke(handler, &ctx, source, op).await {
                        Ok(fingerprint) => {
                            return Ok(Outcome::Resolved(Resolved {
                                fingerprint,
                                source_index: index,
                                attempts: index + 1 - start,
                            }));
                        }
                        Err(_) if cancel.is_cancelled() => return Err(Error::Cancelled),
                        Err(e) => AttemptError::Handler(e),
                    }
                }
            };

            if index + 1 < total {
                tracing::warn!(
                    dataset = dataset_id,
                    source = %source,
                    error = %error,
                    "Source failed, falling back"
                );
                reporter.report(
                    StatusLine::new(Severity::Warn, dataset_id, error.to_string())
                        .with_attempt(index + 1, total),
                );
            }
            last_error = Some(error);
        }

        match last_error {
            Some(last_error) => Ok(Outcome::Exhausted(Exhausted {
                attempts: total - start,
                last_error,
                unresolved,
            })),
            None => Err(Error::config(format!(
                "dataset {dataset_id:?}: missing source configuration"
            ))),
        }
    }
}

async fn invoke(
    handler: Arc<dyn SourceHandler>,
    ctx: &OpContext,
    source: &SourceSpec,
    op: Operation<'_>,
) -> HandlerResult<String> {
    ctx.run(async {
        if let Operation::FetchAndFingerprint { dest } = op {
            handler.fetch(ctx, source, dest).await?;
        }
        handler.fingerprint(ctx, source).await
    })
    .await
}
