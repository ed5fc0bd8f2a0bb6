use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use ts_rs::TS;

use crate::defaults::DEFAULT_ORG_NAME;

static FILE_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("file-unsafe pattern compiles"));
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

#[derive(Debug, Error)]
pub enum BackupFileError {
    #[error("backup file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid backup JSON: {detail} ({path}, line {line}, column {column})")]
    InvalidJson {
        path: PathBuf,
        line: usize,
        column: usize,
        detail: String,
    },
    #[error("serialize backup: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SavedBackupFile {
    pub file_path: String,
    #[ts(type = "number")]
    pub bytes_written: usize,
}

fn safe_org_segment(org_name: &str) -> String {
    let source = org_name.trim();
    let source = if source.is_empty() { DEFAULT_ORG_NAME } else { source };
    let replaced = FILE_UNSAFE.replace_all(source, "_");
    let safe = WHITESPACE.replace_all(&replaced, "_");
    if safe.is_empty() {
        DEFAULT_ORG_NAME.to_string()
    } else {
        safe.into_owned()
    }
}

/// `薪酬数据备份_<org>_<YYYY-MM-DD>.json`
pub fn default_backup_file_name(org_name: &str, date: &str) -> String {
    format!("薪酬数据备份_{}_{}.json", safe_org_segment(org_name), date)
}

pub fn with_json_extension(path: &Path) -> PathBuf {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        path.to_path_buf()
    } else {
        let mut raw = path.as_os_str().to_os_string();
        raw.push(".json");
        PathBuf::from(raw)
    }
}

/// Writes `payload` as pretty JSON, replacing any existing file atomically.
pub fn save_backup_json<T: Serialize>(
    path: &Path,
    payload: &T,
) -> Result<SavedBackupFile, BackupFileError> {
    let target = with_json_extension(path);
    let content = serde_json::to_string_pretty(payload)?;
    crate::db::write_atomic(&target, content.as_bytes()).map_err(|source| BackupFileError::Io {
        path: target.clone(),
        source,
    })?;
    tracing::info!(
        target: "payroll",
        event = "backup_file_saved",
        path = %target.display(),
        bytes = content.len()
    );
    Ok(SavedBackupFile {
        file_path: target.display().to_string(),
        bytes_written: content.len(),
    })
}

pub fn open_backup_json(path: &Path) -> Result<Value, BackupFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| BackupFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|err| BackupFileError::InvalidJson {
        path: path.to_path_buf(),
        line: err.line(),
        column: err.column(),
        detail: err.to_string(),
    })
}
