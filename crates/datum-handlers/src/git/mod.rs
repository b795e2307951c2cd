//! `git` sources: one file at a ref of a git repository
//!
//! ```yaml
//! source:
//!   type: git
//!   url: https://github.com/org/datasets.git
//!   ref: main          # branch, tag, refs/... name or commit id
//!   path: data/iris.csv
//! ```
//!
//! The fingerprint is the blob id of the file, so unrelated commits to the
//! repository do not count as drift.

mod auth;
mod mirror;

pub use auth::GitAuth;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use datum_core::{HandlerError, HandlerResult, OpContext, SourceHandler, SourceSpec};
use serde::Deserialize;

use mirror::Mirror;

pub const TAG: &str = "git";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "DATUM_CACHE_DIR";

#[derive(Debug, Deserialize)]
struct GitSource {
    #[serde(default)]
    url: String,
    #[serde(default, rename = "ref")]
    reference: String,
    #[serde(default)]
    path: String,
}

impl GitSource {
    fn from_spec(source: &SourceSpec) -> HandlerResult<Self> {
        let params: GitSource = source.decode()?;
        if params.url.is_empty() || params.reference.is_empty() || params.path.is_empty() {
            return Err(HandlerError::invalid(
                TAG,
                "require source.url, source.ref, source.path",
            ));
        }
        Ok(params)
    }
}

/// Default cache root: `$DATUM_CACHE_DIR`, else the platform cache dir.
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("datum")
}

/// Handler for files inside git repositories.
#[derive(Debug, Clone)]
pub struct GitHandler {
    cache_root: PathBuf,
}

impl Default for GitHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHandler {
    pub fn new() -> Self {
        Self::with_cache_dir(default_cache_dir())
    }

    pub fn with_cache_dir(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }
}

async fn blocking<T, F>(f: F) -> HandlerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> HandlerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| HandlerError::Other(e.to_string()))?
}

#[async_trait]
impl SourceHandler for GitHandler {
    async fn fingerprint(&self, ctx: &OpContext, source: &SourceSpec) -> HandlerResult<String> {
        let params = GitSource::from_spec(source)?;
        let cache_root = self.cache_root.clone();
        let cancel = ctx.cancellation().clone();

        blocking(move || {
            let mirror = Mirror::sync(&cache_root, &params.url, &GitAuth::from_env(), &cancel)?;
            let commit = mirror.resolve_commit(&params.reference)?;
            let blob = mirror.blob_at(&commit, &params.path)?;
            Ok(format!("gitblob:{blob}"))
        })
        .await
    }

    async fn fetch(&self, ctx: &OpContext, source: &SourceSpec, dest: &Path) -> HandlerResult<()> {
        let params = GitSource::from_spec(source)?;
        let cache_root = self.cache_root.clone();
        let cancel = ctx.cancellation().clone();
        let dest = dest.to_path_buf();

        blocking(move || {
            let mirror = Mirror::sync(&cache_root, &params.url, &GitAuth::from_env(), &cancel)?;
            let commit = mirror.resolve_commit(&params.reference)?;
            let blob = mirror.blob_at(&commit, &params.path)?;
            let content = mirror.blob_content(blob)?;
            datum_fs::io::write_atomic_unless(&dest, &content, || cancel.is_cancelled())?;
            tracing::debug!(
                url = %params.url,
                reference = %params.reference,
                commit = %commit.id(),
                bytes = content.len(),
                "Wrote git blob"
            );
            Ok(())
        })
        .await
    }
}
