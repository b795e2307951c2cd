//! Upstream git repositories for exercising the git source handler.
//!
//! Repositories are built with `git2` directly so no `git` binary is needed.
//! Every helper panics on failure; these are test fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Oid, Repository, Signature};
use tempfile::TempDir;

/// A non-bare repository on disk acting as a remote.
///
/// # Example
///
/// ```rust,no_run
/// use datum_test_utils::git::UpstreamRepo;
///
/// let upstream = UpstreamRepo::new();
/// let first = upstream.commit_file("data/iris.csv", "a,b\n1,2\n", "add iris");
/// upstream.tag("v1", first);
/// let url = upstream.url();
/// ```
pub struct UpstreamRepo {
    dir: TempDir,
    repo: Repository,
}

impl Default for UpstreamRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamRepo {
    /// Initialise an empty repository whose default branch is `main`.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("UpstreamRepo: tempdir: {e}"));
        let repo = Repository::init(dir.path())
            .unwrap_or_else(|e| panic!("UpstreamRepo: failed to init repository: {e}"));
        repo.set_head("refs/heads/main")
            .unwrap_or_else(|e| panic!("UpstreamRepo: failed to point HEAD at main: {e}"));
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// URL a git client can fetch from (a plain local path).
    pub fn url(&self) -> String {
        self.dir.path().display().to_string()
    }

    /// Write `content` to `rel_path`, stage it and commit on `main`.
    ///
    /// Returns the new commit id.
    pub fn commit_file(&self, rel_path: &str, content: &str, message: &str) -> Oid {
        let full = self.dir.path().join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("commit_file: failed to create {}: {e}", parent.display()));
        }
        fs::write(&full, content)
            .unwrap_or_else(|e| panic!("commit_file: failed to write {}: {e}", full.display()));

        let mut index = self.repo.index().unwrap_or_else(|e| panic!("commit_file: index: {e}"));
        index
            .add_path(Path::new(rel_path))
            .unwrap_or_else(|e| panic!("commit_file: failed to stage {rel_path}: {e}"));
        index.write().unwrap_or_else(|e| panic!("commit_file: index write: {e}"));
        let tree_id = index
            .write_tree()
            .unwrap_or_else(|e| panic!("commit_file: write tree: {e}"));
        let tree = self
            .repo
            .find_tree(tree_id)
            .unwrap_or_else(|e| panic!("commit_file: find tree: {e}"));

        let signature = Signature::now("Test User", "test@test.com")
            .unwrap_or_else(|e| panic!("commit_file: signature: {e}"));
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap_or_else(|e| panic!("commit_file: commit: {e}"))
    }

    /// Create an annotated tag pointing at `commit`.
    pub fn tag(&self, name: &str, commit: Oid) {
        let object = self
            .repo
            .find_object(commit, None)
            .unwrap_or_else(|e| panic!("tag: find {commit}: {e}"));
        let signature = Signature::now("Test User", "test@test.com")
            .unwrap_or_else(|e| panic!("tag: signature: {e}"));
        self.repo
            .tag(name, &object, &signature, name, false)
            .unwrap_or_else(|e| panic!("tag: failed to create {name}: {e}"));
    }

    /// Blob id of `rel_path` at `commit`, as a hex string.
    pub fn blob_id(&self, commit: Oid, rel_path: &str) -> String {
        let commit = self
            .repo
            .find_commit(commit)
            .unwrap_or_else(|e| panic!("blob_id: find commit: {e}"));
        let tree = commit.tree().unwrap_or_else(|e| panic!("blob_id: tree: {e}"));
        let entry = tree
            .get_path(Path::new(rel_path))
            .unwrap_or_else(|e| panic!("blob_id: {rel_path} not in tree: {e}"));
        entry.id().to_string()
    }
}

/// Scratch directory to use as a git mirror cache.
pub fn cache_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("cache_dir: tempdir: {e}"));
    let path = dir.path().join("cache");
    (dir, path)
}
