//! Synchronization engine for datum
//!
//! `datum` keeps local copies of remote datasets in step with their sources.
//! This crate holds everything between the configuration file and the
//! handlers that talk to the outside world:
//!
//! - **Configuration**: loading and validating `.data.yaml`, normalizing each
//!   dataset's sources to an ordered fallback list
//! - **Handlers**: the [`SourceHandler`] trait and the [`HandlerRegistry`]
//!   that maps a source's `type` tag to its handler
//! - **Fallback**: trying sources in order until one succeeds
//! - **Policies**: deciding what drift means for a dataset (`fail`,
//!   `update`, `log`)
//! - **Lock state**: the persisted record of accepted fingerprints
//! - **Engine**: the `check` and `fetch` runs that tie it all together
//!
//! # Architecture
//!
//! ```text
//!                  datum-cli
//!                      |
//!       +--------------+--------------+
//!       |                             |
//!   datum-core  <-- SourceHandler -- datum-handlers
//!       |                             |
//!       +-----------  datum-fs  ------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use datum_core::{DataConfig, Engine, EngineOptions, HandlerRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = DataConfig::load(Path::new(".data.yaml"))?;
//! let registry = datum_handlers::builtin_registry();
//! let engine = Engine::new(&registry, EngineOptions::default());
//! let mut lines = Vec::new();
//! let report = engine
//!     .check(&config, Path::new(".data.lock.yaml"), &CancellationToken::new(), &mut lines)
//!     .await?;
//! std::process::exit(report.status.exit_code());
//! ```

pub mod config;
pub mod error;
pub mod fallback;
pub mod handler;
pub mod lock;
pub mod policy;
pub mod source;
pub mod sync;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{DataConfig, Dataset, Defaults};
pub use error::{Error, HandlerError, Result};
pub use fallback::{FallbackCoordinator, Operation, Outcome};
pub use handler::{HandlerRegistry, HandlerResult, OpContext, SourceHandler};
pub use lock::{LOCK_VERSION, LockEntry, LockState};
pub use policy::{Action, Decision, Policy, Staleness};
pub use source::SourceSpec;
pub use sync::{
    Attempt, Engine, EngineOptions, Reporter, RunReport, RunStatus, Severity, StatusLine,
};
