//! Command implementations for datum-cli

pub mod check;
pub mod fetch;

use std::path::PathBuf;
use std::time::Duration;

use datum_core::{DataConfig, EngineOptions, HandlerRegistry};

pub use check::run_check;
pub use fetch::run_fetch;

/// Everything a command needs, resolved from the command line.
#[derive(Debug)]
pub struct RunContext {
    pub config_path: PathBuf,
    pub lock_path: PathBuf,
    pub options: EngineOptions,
    pub registry: HandlerRegistry,
}

impl RunContext {
    pub fn new(config_path: PathBuf, lock_path: PathBuf, timeout_secs: u64) -> Self {
        Self {
            config_path,
            lock_path,
            options: EngineOptions {
                op_timeout: Duration::from_secs(timeout_secs),
            },
            registry: datum_handlers::builtin_registry(),
        }
    }

    /// Load and validate the configuration before any source is touched.
    pub fn load_config(&self) -> datum_core::Result<DataConfig> {
        let config = DataConfig::load(&self.config_path)?;
        tracing::debug!(
            path = %self.config_path.display(),
            datasets = config.datasets.len(),
            "Loaded configuration"
        );
        Ok(config)
    }
}
