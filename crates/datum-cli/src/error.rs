//! Error types for datum-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that end the process before a run report is available
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] datum_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Exit code for a run that could not complete.
    ///
    /// Every error at this level is a configuration, lock or environment
    /// problem, or a cancelled run, all of which exit 2.
    pub fn exit_code(&self) -> i32 {
        2
    }
}
