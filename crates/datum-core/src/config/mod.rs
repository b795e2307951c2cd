//! Dataset configuration
//!
//! The configuration file (`.data.yaml` by default, JSON when the extension
//! is `.json`) lists datasets, each with a target path, a drift policy and
//! one or more candidate sources:
//!
//! ```yaml
//! version: 1
//! defaults:
//!   policy: fail
//!   algo: sha256
//! datasets:
//!   - id: iris
//!     target: data/iris.csv
//!     policy: update
//!     sources:
//!       - type: http
//!         url: https://example.org/iris.csv
//!       - type: file
//!         path: /mnt/mirror/iris.csv
//! ```
//!
//! Loading validates the whole file up front; see [`resolver`] for the rules.

mod manifest;
pub mod resolver;

pub use manifest::{RawConfig, RawDataset, RawDefaults};
pub use resolver::resolve_sources;

use std::path::{Path, PathBuf};

use datum_fs::structured;

use crate::policy::Policy;
use crate::source::SourceSpec;
use crate::{Error, Result};

/// Configuration format version understood by this build.
pub const SUPPORTED_VERSION: u32 = 1;

/// The only content hash algorithm in use.
pub const SUPPORTED_ALGO: &str = "sha256";

/// A validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub version: u32,
    pub defaults: Defaults,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub policy: Policy,
    pub algo: String,
}

/// One dataset with its sources normalized to an ordered, non-empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub id: String,
    pub desc: Option<String>,
    /// Materialized location, relative to the working directory unless absolute
    pub target: PathBuf,
    pub policy: Policy,
    pub sources: Vec<SourceSpec>,
}

impl DataConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw: RawConfig = structured::load(path).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        resolver::resolve(raw)
    }

    /// Parse and validate YAML configuration text.
    pub fn parse(yaml: &str) -> Result<Self> {
        let path = Path::new("config.yaml");
        let raw: RawConfig = structured::parse(path, yaml).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        resolver::resolve(raw)
    }

    pub fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.id == id)
    }
}
