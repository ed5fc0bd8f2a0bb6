#![allow(clippy::unwrap_used, clippy::expect_used)]

use payroll_lib::backup::file::save_backup_json;
use payroll_lib::db::write_atomic;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn commit_writes_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("payroll-system.json");
    write_atomic(&path, b"{}").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"{}");
}

#[test]
fn overwrite_replaces_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("payroll-system.json");
    fs::write(&path, b"{\"old\":true}").unwrap();
    write_atomic(&path, b"{\"new\":true}").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"{\"new\":true}");
}

#[test]
fn failure_leaves_original() {
    let dir = tempdir().unwrap();
    let existing = dir.path().join("orig.json");
    fs::write(&existing, b"old").unwrap();
    let bad_path = dir.path().join("missing").join("file.json");
    assert!(write_atomic(&bad_path, b"data").is_err());
    assert_eq!(fs::read(&existing).unwrap(), b"old");
    assert!(!bad_path.parent().unwrap().exists());
}

#[test]
fn backup_save_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    let saved = save_backup_json(&dir.path().join("backup"), &json!({"version": 2})).unwrap();
    assert!(saved.file_path.ends_with("backup.json"));
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}
