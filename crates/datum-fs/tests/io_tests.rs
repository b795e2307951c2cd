//! Tests for atomic file replacement

use datum_fs::{Error, io};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::fs;
use tempfile::TempDir;

fn temp_files(dir: &std::path::Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[test]
fn test_write_atomic_creates_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test.txt");

    io::write_atomic(&path, b"hello world").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test.txt");
    fs::write(&path, "original").unwrap();

    io::write_atomic(&path, b"updated").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "updated");
}

#[test]
fn test_write_atomic_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a").join("b").join("file.txt");

    io::write_atomic(&path, b"deep content").unwrap();

    assert_eq!(io::read_text(&path).unwrap(), "deep content");
}

#[test]
fn test_write_atomic_leaves_no_temp_file() {
    let temp = TempDir::new().unwrap();
    io::write_atomic(&temp.path().join("target.txt"), b"content").unwrap();

    assert!(temp_files(temp.path()).is_empty());
}

#[test]
fn test_abandoned_temp_file_does_not_affect_destination() {
    // Simulates a crash after the temp file was written but before rename.
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("lock.yaml");
    fs::write(&path, "version: 1\n").unwrap();
    fs::write(io::temp_path_for(&path), "half-written garb").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "version: 1\n");

    // The next successful write replaces both cleanly.
    io::write_atomic(&path, b"version: 1\nitems: {}\n").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "version: 1\nitems: {}\n");
    assert!(temp_files(temp.path()).is_empty());
}

#[test]
fn test_copy_atomic_copies_content() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source.csv");
    let dest = temp.path().join("out").join("dest.csv");
    fs::write(&source, "a,b\n1,2\n").unwrap();

    let copied = io::copy_atomic(&source, &dest).unwrap();

    assert_eq!(copied, 8);
    assert_eq!(fs::read_to_string(&dest).unwrap(), "a,b\n1,2\n");
    assert!(temp_files(&temp.path().join("out")).is_empty());
}

#[test]
fn test_copy_atomic_missing_source_keeps_destination() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("dest.csv");
    fs::write(&dest, "previous").unwrap();

    let err = io::copy_atomic(&temp.path().join("missing.csv"), &dest).unwrap_err();

    assert!(err.is_not_found());
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "previous");
}

#[test]
fn test_copy_atomic_interrupted_mid_copy_keeps_destination() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source.bin");
    let dest = temp.path().join("dest.bin");
    fs::write(&source, vec![7u8; 256 * 1024]).unwrap();
    fs::write(&dest, "previous").unwrap();

    let checks = Cell::new(0);
    let err = io::copy_atomic_unless(&source, &dest, || {
        checks.set(checks.get() + 1);
        checks.get() > 2
    })
    .unwrap_err();

    assert!(matches!(err, Error::Interrupted { .. }));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "previous");
    assert!(temp_files(temp.path()).is_empty());
}

#[test]
fn test_copy_atomic_interrupted_before_start_creates_nothing() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source.csv");
    let dest = temp.path().join("out").join("dest.csv");
    fs::write(&source, "a,b\n").unwrap();

    let err = io::copy_atomic_unless(&source, &dest, || true).unwrap_err();

    assert!(matches!(err, Error::Interrupted { .. }));
    assert!(!dest.exists());
}

#[test]
fn test_write_atomic_interrupted_keeps_destination() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("dest.csv");
    fs::write(&dest, "previous").unwrap();

    let err = io::write_atomic_unless(&dest, b"replacement", || true).unwrap_err();

    assert!(matches!(err, Error::Interrupted { .. }));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "previous");
    assert!(temp_files(temp.path()).is_empty());
}

#[test]
fn test_pending_file_dropped_before_persist_is_removed() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out").join("dest.csv");

    let pending = io::PendingFile::for_dest(&dest).unwrap();
    fs::write(pending.path(), "half").unwrap();
    drop(pending);

    assert!(!dest.exists());
    assert!(temp_files(&temp.path().join("out")).is_empty());
}

#[test]
fn test_pending_file_persist_replaces_destination() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("dest.csv");
    fs::write(&dest, "previous").unwrap();

    let pending = io::PendingFile::for_dest(&dest).unwrap();
    fs::write(pending.path(), "fresh").unwrap();
    pending.persist_unless(|| false).unwrap();

    assert_eq!(fs::read_to_string(&dest).unwrap(), "fresh");
    assert!(temp_files(temp.path()).is_empty());
}

#[test]
fn test_read_text_nonexistent_file() {
    let temp = TempDir::new().unwrap();
    let result = io::read_text(&temp.path().join("missing.txt"));
    assert!(result.unwrap_err().is_not_found());
}
