//! Running checks and fetches
//!
//! - **engine**: the per-dataset orchestration loop
//! - **status**: run status lattice, status lines and reporters

mod engine;
mod status;

pub use engine::{Engine, EngineOptions};
pub use status::{Attempt, Reporter, RunReport, RunStatus, Severity, StatusLine};
