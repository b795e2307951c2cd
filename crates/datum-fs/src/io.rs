//! Atomic I/O operations with file locking
//!
//! Every write that replaces a file the user can observe (the lock file, a
//! materialized dataset) goes through a sibling temporary file that is
//! renamed onto the destination only once it is complete and flushed.

use std::fs::{self, File, OpenOptions};
use std::io::{self as stdio, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;

use crate::{Error, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary sibling path used while `path` is being replaced.
///
/// The temp file lives in the same directory so the final rename never
/// crosses a filesystem boundary. Names are unique per process and call, so
/// concurrent writers never share a temp file.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    path.with_file_name(temp_name)
}

/// Create the parent directory of `path` if it does not exist yet.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock on the temp file while it is being written.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    write_atomic_unless(path, content, || false)
}

/// [`write_atomic`] that gives up, leaving `path` untouched, if
/// `interrupted` returns true once the content is flushed.
pub fn write_atomic_unless(
    path: &Path,
    content: &[u8],
    interrupted: impl Fn() -> bool,
) -> Result<()> {
    ensure_parent(path)?;
    let temp_path = temp_path_for(path);

    let result = write_locked(path, &temp_path, content);
    if result.is_err() {
        discard(&temp_path);
        return result;
    }

    persist_unless(&temp_path, path, interrupted)
}

fn write_locked(path: &Path, temp_path: &Path, content: &[u8]) -> Result<()> {
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)
        .map_err(|e| Error::io(temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    Ok(())
}

const COPY_CHUNK: usize = 64 * 1024;

/// Copy `source` onto `dest` atomically, creating parent directories.
///
/// Returns the number of bytes copied. On failure the destination is left
/// untouched and the temp file is removed.
pub fn copy_atomic(source: &Path, dest: &Path) -> Result<u64> {
    copy_atomic_unless(source, dest, || false)
}

/// [`copy_atomic`] that checks `interrupted` between chunks and before the
/// rename. Once it returns true the copy stops with [`Error::Interrupted`]
/// and `dest` is left untouched.
pub fn copy_atomic_unless(
    source: &Path,
    dest: &Path,
    interrupted: impl Fn() -> bool,
) -> Result<u64> {
    let mut input = File::open(source).map_err(|e| Error::io(source, e))?;
    if interrupted() {
        return Err(Error::Interrupted {
            path: dest.to_path_buf(),
        });
    }
    ensure_parent(dest)?;
    let temp_path = temp_path_for(dest);

    let copied = (|| -> Result<u64> {
        let mut output = File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut copied = 0u64;
        loop {
            if interrupted() {
                return Err(Error::Interrupted {
                    path: dest.to_path_buf(),
                });
            }
            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == stdio::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(source, e)),
            };
            output
                .write_all(&buf[..n])
                .map_err(|e| Error::io(&temp_path, e))?;
            copied += n as u64;
        }
        output.sync_all().map_err(|e| Error::io(&temp_path, e))?;
        Ok(copied)
    })();

    match copied {
        Ok(copied) => {
            persist_unless(&temp_path, dest, interrupted)?;
            Ok(copied)
        }
        Err(e) => {
            discard(&temp_path);
            Err(e)
        }
    }
}

/// [`persist`] unless `interrupted` returns true, in which case the temp
/// file is discarded.
pub fn persist_unless(
    temp_path: &Path,
    dest: &Path,
    interrupted: impl Fn() -> bool,
) -> Result<()> {
    if interrupted() {
        discard(temp_path);
        return Err(Error::Interrupted {
            path: dest.to_path_buf(),
        });
    }
    persist(temp_path, dest)
}

/// Rename a completed temp file onto its destination.
pub fn persist(temp_path: &Path, dest: &Path) -> Result<()> {
    fs::rename(temp_path, dest).map_err(|e| {
        discard(temp_path);
        Error::io(dest, e)
    })
}

/// Best-effort removal of an abandoned temp file.
pub fn discard(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path)
        && e.kind() != stdio::ErrorKind::NotFound
    {
        tracing::warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
    }
}

/// A temp sibling of `dest` that is removed on drop unless persisted.
///
/// Async writers hold one across await points so a dropped future never
/// leaves the temp file behind.
#[derive(Debug)]
pub struct PendingFile {
    temp_path: PathBuf,
    dest: PathBuf,
    persisted: bool,
}

impl PendingFile {
    /// Reserve a temp path for `dest`, creating parent directories.
    pub fn for_dest(dest: &Path) -> Result<Self> {
        ensure_parent(dest)?;
        Ok(Self {
            temp_path: temp_path_for(dest),
            dest: dest.to_path_buf(),
            persisted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.temp_path
    }

    pub fn exists(&self) -> bool {
        self.temp_path.exists()
    }

    /// Rename onto the destination unless `interrupted` returns true.
    pub fn persist_unless(mut self, interrupted: impl Fn() -> bool) -> Result<()> {
        self.persisted = true;
        persist_unless(&self.temp_path, &self.dest, interrupted)
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.persisted {
            discard(&self.temp_path);
        }
    }
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}
