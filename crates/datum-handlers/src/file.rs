//! `file` sources: a path on a local or mounted filesystem

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use datum_core::{HandlerError, HandlerResult, OpContext, SourceHandler, SourceSpec};
use serde::Deserialize;

pub const TAG: &str = "file";

#[derive(Debug, Deserialize)]
struct FileSource {
    #[serde(default)]
    path: PathBuf,
}

impl FileSource {
    fn from_spec(source: &SourceSpec) -> HandlerResult<Self> {
        let params: FileSource = source.decode()?;
        if params.path.as_os_str().is_empty() {
            return Err(HandlerError::invalid(TAG, "missing source.path"));
        }
        Ok(params)
    }
}

/// Fingerprints by content hash and copies atomically.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHandler;

impl FileHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceHandler for FileHandler {
    async fn fingerprint(&self, _ctx: &OpContext, source: &SourceSpec) -> HandlerResult<String> {
        let FileSource { path } = FileSource::from_spec(source)?;
        tokio::task::spawn_blocking(move || {
            datum_fs::compute_file_checksum(&path).map_err(|e| HandlerError::io(&path, e))
        })
        .await
        .map_err(|e| HandlerError::Other(e.to_string()))?
    }

    async fn fetch(&self, ctx: &OpContext, source: &SourceSpec, dest: &Path) -> HandlerResult<()> {
        let FileSource { path } = FileSource::from_spec(source)?;
        let dest = dest.to_path_buf();
        // The blocking copy outlives a timed-out fetch; it must not rename afterwards.
        let cancel = ctx.cancellation().clone();
        let copied = tokio::task::spawn_blocking(move || {
            datum_fs::io::copy_atomic_unless(&path, &dest, || cancel.is_cancelled())
        })
        .await
        .map_err(|e| HandlerError::Other(e.to_string()))??;
        tracing::debug!(bytes = copied, "Copied file source");
        Ok(())
    }
}
