//! Error types for datum-core

use std::path::PathBuf;
use std::time::Duration;

/// Result type for datum-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a whole load or run.
///
/// Dataset-scoped failures (a source that cannot be reached, drift under the
/// `fail` policy) are not errors at this level: they are reported as status
/// lines and folded into the run status.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration is structurally valid YAML/JSON but violates a rule
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// The configuration file could not be read or parsed
    #[error("Failed to load configuration from {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: datum_fs::Error,
    },

    /// The lock file could not be read, parsed or written
    #[error("Lock file error at {path}: {source}")]
    LockFile {
        path: PathBuf,
        #[source]
        source: datum_fs::Error,
    },

    /// The lock file was written by a newer, incompatible format version
    #[error("Lock file {path} has unsupported version {version} (supported: {supported})")]
    UnsupportedLockVersion {
        path: PathBuf,
        version: u32,
        supported: u32,
    },

    /// No handler is registered for a source type tag
    #[error("Unknown source type: {tag}")]
    UnknownHandler { tag: String },

    /// The run was cancelled before it completed
    #[error("Run cancelled")]
    Cancelled,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for errors caused by the configuration rather than the environment.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::ConfigFile { .. } | Self::UnknownHandler { .. }
        )
    }
}

/// Failure of a single handler operation against a single source.
///
/// Handlers live outside the engine and may talk to anything; the engine
/// only needs a printable reason, so transport-specific errors are carried
/// as messages.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The source descriptor lacks a field the handler needs or has a bad value
    #[error("{kind}: {message}")]
    InvalidSource { kind: String, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fs(datum_fs::Error),

    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    #[error("Command failed ({status}): {command}\n{output}")]
    Command {
        command: String,
        status: String,
        output: String,
    },

    #[error("Git error: {message}")]
    Git { message: String },

    #[error("Timed out after {}s", .after.as_secs_f64())]
    Timeout { after: Duration },

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn invalid(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSource {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<datum_fs::Error> for HandlerError {
    fn from(err: datum_fs::Error) -> Self {
        match err {
            datum_fs::Error::Interrupted { .. } => Self::Cancelled,
            other => Self::Fs(other),
        }
    }
}
