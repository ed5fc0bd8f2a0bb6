//! The command surface used by the UI shell and the CLI. Every command maps
//! library errors into [`AppError`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::backup::file::{
    default_backup_file_name, open_backup_json, save_backup_json, SavedBackupFile,
};
use crate::config::{AppEnv, ReadSource, WriteMode};
use crate::db::{read_pragmas, reset::reset_database};
use crate::import::{
    find_conflicts, merge_import_rows, parse_employee_rows, ConflictDecision, EmployeeImportRow,
    ImportConflict, MergeSummary,
};
use crate::model::{
    BackupEnvelope, ClearDataResult, Employee, ImportBackupResult, OrganizationSettings,
    ReplaceEmployeesResult, StorageInfo,
};
use crate::repo::RepositoryAdapter;
use crate::{AppError, AppResult, AppState};

pub async fn settings_get(state: &AppState) -> AppResult<OrganizationSettings> {
    Ok(state.repository.get_settings().await?)
}

pub async fn settings_save(state: &AppState, settings: OrganizationSettings) -> AppResult<()> {
    Ok(state.repository.save_settings(settings).await?)
}

pub async fn employees_list(state: &AppState) -> AppResult<Vec<Employee>> {
    Ok(state.repository.list_employees().await?)
}

pub async fn employees_replace(
    state: &AppState,
    employees: Vec<Employee>,
) -> AppResult<ReplaceEmployeesResult> {
    Ok(state.repository.replace_employees(employees).await?)
}

pub async fn backup_export(state: &AppState) -> AppResult<BackupEnvelope> {
    Ok(state.repository.export_backup().await?)
}

pub async fn backup_import(state: &AppState, payload: Value) -> AppResult<ImportBackupResult> {
    Ok(state.repository.import_backup(payload).await?)
}

pub async fn data_clear(state: &AppState) -> AppResult<ClearDataResult> {
    Ok(state.repository.clear_data().await?)
}

pub async fn storage_info(state: &AppState) -> AppResult<StorageInfo> {
    Ok(state.repository.get_storage_info().await?)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DbRuntimeInfo {
    pub app_env: AppEnv,
    pub read_source: ReadSource,
    pub write_mode: WriteMode,
    pub db_path: String,
    pub legacy_store_path: String,
    #[ts(type = "number")]
    pub schema_version: i64,
    pub journal_mode: String,
    pub foreign_keys: bool,
}

pub async fn db_runtime_info(state: &AppState) -> AppResult<DbRuntimeInfo> {
    let pragmas = read_pragmas(&state.db.pool).await;
    let schema_version = crate::migrate::schema_version(&state.db.pool).await?;
    Ok(DbRuntimeInfo {
        app_env: state.config.context.app_env,
        read_source: state.config.context.read_source,
        write_mode: state.config.context.write_mode,
        db_path: state.config.db_path.display().to_string(),
        legacy_store_path: state.config.legacy_store_path.display().to_string(),
        schema_version,
        journal_mode: pragmas.journal_mode,
        foreign_keys: pragmas.foreign_keys,
    })
}

/// Test mode only. Empties the relational business tables.
pub async fn db_reset(state: &AppState) -> AppResult<ClearDataResult> {
    Ok(reset_database(state.config.context.app_env, &state.db.pool).await?)
}

/// Exports and writes a backup. With no `target`, the templated file name is
/// used inside `dir`.
pub async fn backup_save_file(
    state: &AppState,
    dir: &Path,
    target: Option<PathBuf>,
) -> AppResult<SavedBackupFile> {
    let envelope = state.repository.export_backup().await?;
    let path = match target {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(dir)?;
            dir.join(default_backup_file_name(
                &envelope.data.org_name,
                &crate::time::today_ymd(),
            ))
        }
    };
    Ok(save_backup_json(&path, &envelope)?)
}

/// Reads a backup file and imports it through the repository.
pub async fn backup_open_file(state: &AppState, path: &Path) -> AppResult<ImportBackupResult> {
    let payload = open_backup_json(path)?;
    Ok(state.repository.import_backup(payload).await?)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportPreview {
    pub rows: Vec<EmployeeImportRow>,
    pub errors: Vec<String>,
    pub conflicts: Vec<ImportConflict>,
}

/// Validates decoded sheet rows and lists conflicts with current employees.
pub async fn employees_import_preview(
    state: &AppState,
    records: Vec<Value>,
) -> AppResult<ImportPreview> {
    let parsed = parse_employee_rows(&records);
    let existing = state.repository.list_employees().await?;
    let scan = find_conflicts(&existing, &parsed.rows);
    Ok(ImportPreview {
        rows: parsed.rows,
        errors: parsed.errors.iter().map(ToString::to_string).collect(),
        conflicts: scan.conflicts,
    })
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportApplyResult {
    pub summary: MergeSummary,
    #[ts(type = "number")]
    pub count: usize,
}

/// Merges validated rows into the current set and replaces it. Conflicts
/// without an entry in `decisions` (keyed by sheet row number) are skipped.
pub async fn employees_import_apply(
    state: &AppState,
    rows: Vec<EmployeeImportRow>,
    decisions: HashMap<usize, ConflictDecision>,
) -> AppResult<ImportApplyResult> {
    if let Some(row) = rows.iter().find(|row| row.name.trim().is_empty()) {
        return Err(AppError::from(crate::import::RowError::MissingName {
            row: row.row_number,
        }));
    }
    let existing = state.repository.list_employees().await?;
    let outcome = merge_import_rows(&existing, &rows, |conflict| {
        decisions
            .get(&conflict.row.row_number)
            .copied()
            .unwrap_or(ConflictDecision::Skip)
    });
    let replaced = state.repository.replace_employees(outcome.employees).await?;
    Ok(ImportApplyResult {
        summary: outcome.summary,
        count: replaced.count,
    })
}
