//! Bare mirrors of remote repositories kept in the cache directory
//!
//! One mirror per repository URL, keyed by a short hash of the URL. Remote
//! branches land under `refs/remotes/origin/*`, tags under `refs/tags/*`.

use std::fs;
use std::path::{Path, PathBuf};

use datum_core::{HandlerError, HandlerResult};
use git2::{
    AutotagOption, Commit, CredentialType, FetchOptions, FetchPrune, ObjectType, Oid,
    RemoteCallbacks, Repository,
};
use tokio_util::sync::CancellationToken;

use super::auth::GitAuth;

const REMOTE: &str = "origin";
const REFSPECS: [&str; 2] = ["+refs/heads/*:refs/remotes/origin/*", "+refs/tags/*:refs/tags/*"];

pub(crate) fn git_error(e: git2::Error) -> HandlerError {
    HandlerError::Git {
        message: e.message().to_string(),
    }
}

/// Location of the mirror for `url` under `cache_root`.
pub(crate) fn mirror_path(cache_root: &Path, url: &str) -> PathBuf {
    let digest = datum_fs::compute_content_checksum(url);
    let hex = digest.trim_start_matches(datum_fs::checksum::PREFIX);
    cache_root.join("git").join(&hex[..16])
}

pub(crate) struct Mirror {
    repo: Repository,
}

impl Mirror {
    /// Open the mirror for `url`, creating it if needed, and fetch from the remote.
    ///
    /// A failed fetch into a brand-new mirror is an error and the mirror is
    /// removed. A failed fetch into an existing mirror is logged and the
    /// refs already cached are used.
    pub(crate) fn sync(
        cache_root: &Path,
        url: &str,
        auth: &GitAuth,
        cancel: &CancellationToken,
    ) -> HandlerResult<Self> {
        let path = mirror_path(cache_root, url);

        if path.exists() {
            let repo = Repository::open_bare(&path).map_err(git_error)?;
            ensure_remote(&repo, url)?;
            let mirror = Self { repo };
            if let Err(e) = mirror.fetch(auth, cancel) {
                if cancel.is_cancelled() {
                    return Err(HandlerError::Cancelled);
                }
                tracing::warn!(url, error = %e, "Git fetch failed, using cached mirror");
            }
            return Ok(mirror);
        }

        fs::create_dir_all(&path).map_err(|e| HandlerError::io(&path, e))?;
        let created = Repository::init_bare(&path)
            .map_err(git_error)
            .and_then(|repo| {
                ensure_remote(&repo, url)?;
                let mirror = Self { repo };
                mirror.fetch(auth, cancel).map_err(git_error)?;
                Ok(mirror)
            });

        if created.is_err() {
            if let Err(e) = fs::remove_dir_all(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial mirror");
            }
        } else {
            tracing::debug!(url, path = %path.display(), "Created git mirror");
        }
        created
    }

    fn fetch(&self, auth: &GitAuth, cancel: &CancellationToken) -> Result<(), git2::Error> {
        let mut callbacks = RemoteCallbacks::new();
        let mut attempts = 0;
        callbacks.credentials(move |_url, username, allowed| {
            if !allowed.contains(CredentialType::USERNAME) {
                attempts += 1;
            }
            auth.credentials(username, allowed, attempts.max(1))
        });
        let token = cancel.clone();
        callbacks.transfer_progress(move |_| !token.is_cancelled());

        let mut options = FetchOptions::new();
        options
            .remote_callbacks(callbacks)
            .prune(FetchPrune::On)
            .download_tags(AutotagOption::All);

        let mut remote = self.repo.find_remote(REMOTE)?;
        remote.fetch(&REFSPECS, Some(&mut options), None)
    }

    /// Resolve a branch, tag, full ref name or commit id to a commit.
    pub(crate) fn resolve_commit(&self, reference: &str) -> HandlerResult<Commit<'_>> {
        for name in ref_candidates(reference) {
            if let Ok(found) = self.repo.find_reference(&name) {
                return found.peel_to_commit().map_err(git_error);
            }
        }

        if !reference.starts_with("refs/")
            && let Ok(commit) = self
                .repo
                .revparse_single(reference)
                .and_then(|object| object.peel_to_commit())
        {
            return Ok(commit);
        }

        Err(HandlerError::Git {
            message: format!("cannot resolve ref {reference:?}"),
        })
    }

    /// Blob id of `path` in `commit`'s tree.
    pub(crate) fn blob_at(&self, commit: &Commit<'_>, path: &str) -> HandlerResult<Oid> {
        let normalized = normalize(path);
        let tree = commit.tree().map_err(git_error)?;
        let entry = tree
            .get_path(Path::new(&normalized))
            .map_err(|_| HandlerError::Git {
                message: format!("file {path:?} not found at {}", commit.id()),
            })?;
        if entry.kind() != Some(ObjectType::Blob) {
            return Err(HandlerError::Git {
                message: format!("{path:?} is not a file at {}", commit.id()),
            });
        }
        Ok(entry.id())
    }

    pub(crate) fn blob_content(&self, id: Oid) -> HandlerResult<Vec<u8>> {
        let blob = self.repo.find_blob(id).map_err(git_error)?;
        Ok(blob.content().to_vec())
    }
}

fn ensure_remote(repo: &Repository, url: &str) -> HandlerResult<()> {
    match repo.find_remote(REMOTE) {
        Ok(remote) if remote.url() == Some(url) => Ok(()),
        Ok(_) => repo.remote_set_url(REMOTE, url).map_err(git_error),
        Err(_) => repo.remote(REMOTE, url).map(|_| ()).map_err(git_error),
    }
}

/// Reference names to try for `reference`, most specific first.
fn ref_candidates(reference: &str) -> Vec<String> {
    if let Some(branch) = reference.strip_prefix("refs/heads/") {
        vec![format!("refs/remotes/{REMOTE}/{branch}"), reference.to_string()]
    } else if reference.starts_with("refs/") {
        vec![reference.to_string()]
    } else {
        vec![
            format!("refs/remotes/{REMOTE}/{reference}"),
            format!("refs/tags/{reference}"),
        ]
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").trim_start_matches('/').to_string()
}
