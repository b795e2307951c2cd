//! The source handler contract
//!
//! A handler knows how to talk to one kind of source (`http`, `git`, ...).
//! The engine never inspects source fields itself; it looks the handler up
//! by the source's `type` tag in a [`HandlerRegistry`] and delegates.

mod registry;

pub use registry::HandlerRegistry;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::source::SourceSpec;

/// Result type for handler operations
pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// Fingerprints and fetches content for one kind of source.
///
/// Implementations must be cheap to share: the registry hands out
/// `Arc<dyn SourceHandler>` and the engine may call the same handler for
/// many datasets.
#[async_trait]
pub trait SourceHandler: Send + Sync {
    /// Compute an opaque string that changes whenever the content changes.
    async fn fingerprint(&self, ctx: &OpContext, source: &SourceSpec) -> HandlerResult<String>;

    /// Materialize the content at `dest`.
    ///
    /// Parent directories are created as needed and the destination is only
    /// replaced once the content is complete.
    async fn fetch(&self, ctx: &OpContext, source: &SourceSpec, dest: &Path) -> HandlerResult<()>;
}

/// Per-call context: a deadline and a cancellation token.
///
/// Each handler invocation gets its own context whose token is a child of the
/// run's token, so cancelling the run cancels the call, while a timed-out
/// call does not cancel the run.
#[derive(Debug, Clone)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Instant,
    timeout: Duration,
}

impl OpContext {
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        let now = Instant::now();
        // Saturate absurd timeouts instead of overflowing the clock
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365));
        Self {
            cancel: parent.child_token(),
            deadline,
            timeout,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it completes, the context is cancelled, or the
    /// deadline passes. The future is dropped in the latter two cases.
    pub async fn run<T, F>(&self, fut: F) -> HandlerResult<T>
    where
        F: Future<Output = HandlerResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HandlerError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => {
                self.cancel.cancel();
                Err(HandlerError::Timeout { after: self.timeout })
            }
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn run_times_out_at_deadline() {
        let run = CancellationToken::new();
        let ctx = OpContext::new(&run, Duration::from_secs(5));

        let result: HandlerResult<()> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(HandlerError::Timeout { .. })));
        assert!(!run.is_cancelled(), "a timeout must not cancel the run");
    }

    #[tokio::test]
    async fn run_observes_parent_cancellation() {
        let run = CancellationToken::new();
        let ctx = OpContext::new(&run, Duration::from_secs(60));
        run.cancel();

        let result: HandlerResult<u32> = ctx.run(std::future::pending()).await;
        assert!(matches!(result, Err(HandlerError::Cancelled)));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn run_passes_through_results() {
        let ctx = OpContext::new(&CancellationToken::new(), Duration::from_secs(1));
        let result = ctx.run(async { Ok::<_, HandlerError>(7) }).await.unwrap();
        assert_eq!(result, 7);
        assert!(ctx.remaining() <= Duration::from_secs(1));
    }
}
