//! [`TestProject`] builder for end-to-end scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// File name of the configuration written by [`TestProject::config`].
pub const CONFIG_FILE: &str = ".data.yaml";

/// File name of the lock file inside a project.
pub const LOCK_FILE: &str = ".data.lock.yaml";

/// A temporary working directory with helpers for writing inputs and
/// asserting on outputs.
///
/// # Example
///
/// ```rust,no_run
/// use datum_test_utils::project::TestProject;
///
/// let project = TestProject::new();
/// let source = project.write("mirror/iris.csv", "a,b\n");
/// project.config(&format!(
///     "datasets:\n  - id: iris\n    target: data/iris.csv\n    source: {{type: file, path: {}}}\n",
///     source.display()
/// ));
/// project.assert_file_contains("data/iris.csv", "a,b");
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap_or_else(|e| panic!("TestProject: tempdir: {e}")),
        }
    }

    /// Root of the project; run the CLI with this as working directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let full = self.path(rel);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("write: failed to create {}: {e}", parent.display()));
        }
        fs::write(&full, content)
            .unwrap_or_else(|e| panic!("write: failed to write {}: {e}", full.display()));
        full
    }

    /// Write the project's `.data.yaml`.
    pub fn config(&self, yaml: &str) -> PathBuf {
        self.write(CONFIG_FILE, yaml)
    }

    /// Contents of the lock file, or `None` if it has not been written.
    pub fn lock(&self) -> Option<String> {
        fs::read_to_string(self.path(LOCK_FILE)).ok()
    }

    pub fn read(&self, rel: &str) -> String {
        let full = self.path(rel);
        fs::read_to_string(&full)
            .unwrap_or_else(|e| panic!("read: could not read {}: {e}", full.display()))
    }

    pub fn assert_file_exists(&self, rel: &str) {
        let full = self.path(rel);
        assert!(full.exists(), "Expected file to exist: {}", full.display());
    }

    pub fn assert_file_not_exists(&self, rel: &str) {
        let full = self.path(rel);
        assert!(!full.exists(), "Expected file NOT to exist: {}", full.display());
    }

    /// Assert that the file at `rel` contains `content`.
    pub fn assert_file_contains(&self, rel: &str, content: &str) {
        let actual = self.read(rel);
        assert!(
            actual.contains(content),
            "File {rel} does not contain expected content.\nExpected: {content}\nActual: {actual}"
        );
    }
}
