//! Lock state persistence
//!
//! The lock file records, per dataset id, the fingerprint and content hash
//! that were last accepted. It is loaded once at the start of a run, mutated
//! in memory by the engine and written back once through an atomic replace.

mod entry;

pub use entry::LockEntry;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use datum_fs::structured;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lock format version written by this build.
pub const LOCK_VERSION: u32 = 1;

/// In-memory image of a lock file.
///
/// `items` is a `BTreeMap` so two saves of equal state are byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,

    #[serde(default)]
    pub items: BTreeMap<String, LockEntry>,
}

fn default_version() -> u32 {
    LOCK_VERSION
}

impl Default for LockState {
    fn default() -> Self {
        Self::new()
    }
}

impl LockState {
    /// Create an empty lock state
    pub fn new() -> Self {
        Self {
            version: LOCK_VERSION,
            last_checked: None,
            items: BTreeMap::new(),
        }
    }

    /// Load the lock state from `path`.
    ///
    /// A missing or empty file yields an empty state. A file that cannot be
    /// parsed, or that was written by a newer format version, is an error:
    /// silently starting over would forget every accepted fingerprint.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match datum_fs::io::read_text(path) {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %path.display(), "No lock file, starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(Error::LockFile {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            tracing::warn!(path = %path.display(), "Lock file is empty, starting empty");
            return Ok(Self::new());
        }

        let state: LockState =
            structured::parse(path, &content).map_err(|source| Error::LockFile {
                path: path.to_path_buf(),
                source,
            })?;

        if state.version > LOCK_VERSION {
            return Err(Error::UnsupportedLockVersion {
                path: path.to_path_buf(),
                version: state.version,
                supported: LOCK_VERSION,
            });
        }

        tracing::debug!(
            path = %path.display(),
            entries = state.items.len(),
            "Loaded lock file"
        );
        Ok(state)
    }

    /// Save the lock state to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        structured::save(path, self).map_err(|source| Error::LockFile {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), entries = self.items.len(), "Saved lock file");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&LockEntry> {
        self.items.get(id)
    }

    /// Replace the entry for `id`.
    pub fn put(&mut self, id: impl Into<String>, entry: LockEntry) {
        self.items.insert(id.into(), entry);
    }

    /// Mark `id` inaccessible, creating a bare entry when none exists.
    pub fn mark_inaccessible(&mut self, id: &str, error: impl Into<String>, now: DateTime<Utc>) {
        self.items
            .entry(id.to_string())
            .or_default()
            .mark_inaccessible(error, now);
    }

    /// Stamp the state as written by this build at `now`.
    pub fn finish_run(&mut self, now: DateTime<Utc>) {
        self.version = LOCK_VERSION;
        self.last_checked = Some(now);
    }
}
