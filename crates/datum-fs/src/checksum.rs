//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! local content hashes in the lock file and for content-derived
//! fingerprints.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Prefix for all checksums produced by this module
pub const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of in-memory content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// The file is streamed through the hasher, so large datasets are never
/// loaded into memory at once.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}

/// Incremental hasher for content that arrives in chunks (HTTP bodies).
#[derive(Default)]
pub struct StreamingChecksum {
    hasher: Sha256,
}

impl StreamingChecksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn finish(self) -> String {
        format!("{}{:x}", PREFIX, self.hasher.finalize())
    }
}
