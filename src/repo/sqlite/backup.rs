use std::path::Path;

use futures::FutureExt;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::employees::read_employees;
use super::settings::{read_settings, ORG_NAME_KEY, SOCIAL_KEY};
use super::{ensure_companies, insert_employees, parse_json_record, upsert_setting};
use crate::backup::{build_backup_export, normalize_backup_payload};
use crate::db::run_in_tx;
use crate::defaults::DEFAULT_ORG_NAME;
use crate::migrate;
use crate::model::{
    BackupData, BackupEnvelope, ClearDataResult, ImportBackupResult, PayrollPayloadRecord,
    SocialConfig, StorageInfo,
};
use crate::repo::{cleared_tables, RepoResult, RepositoryError, BUSINESS_TABLES};

async fn read_payroll_rows(pool: &SqlitePool, table: &str) -> sqlx::Result<Vec<PayrollPayloadRecord>> {
    let rows: Vec<(String, i64, String, String)> = sqlx::query_as(&format!(
        "SELECT id, employee_id, payroll_month, payload FROM {table} ORDER BY id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, employee_id, payroll_month, payload)| PayrollPayloadRecord {
            id,
            employee_id,
            payroll_month,
            payload: parse_json_record(&payload),
        })
        .collect())
}

async fn insert_payroll_rows(
    conn: &mut SqliteConnection,
    table: &str,
    rows: &[PayrollPayloadRecord],
) -> RepoResult<()> {
    let sql = format!(
        "INSERT INTO {table} (id, employee_id, payroll_month, payload, created_at, updated_at) \
         VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)"
    );
    for row in rows {
        sqlx::query(&sql)
            .bind(&row.id)
            .bind(row.employee_id)
            .bind(&row.payroll_month)
            .bind(serde_json::to_string(&row.payload)?)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn delete_business_rows(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    for table in BUSINESS_TABLES {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub(super) async fn export_backup(pool: &SqlitePool) -> RepoResult<BackupEnvelope> {
    let settings = read_settings(pool).await?;
    let employees = read_employees(pool).await?;
    let payroll_inputs = read_payroll_rows(pool, "payroll_inputs").await?;
    let payroll_results = read_payroll_rows(pool, "payroll_results").await?;

    Ok(build_backup_export(BackupData {
        org_name: settings.org_name,
        social: settings.social,
        companies: settings.companies,
        employees,
        payroll_inputs,
        payroll_results,
    }))
}

/// Replaces every business table with the normalized payload in one
/// transaction.
pub(super) async fn import_backup(pool: &SqlitePool, payload: Value) -> RepoResult<ImportBackupResult> {
    let normalized = normalize_backup_payload(&payload);
    let result = ImportBackupResult::from_normalized(&normalized);
    let data = normalized.data;
    let social = serde_json::to_string(&data.social)?;

    run_in_tx(pool, move |conn| {
        async move {
            delete_business_rows(&mut *conn).await?;
            upsert_setting(&mut *conn, ORG_NAME_KEY, &data.org_name).await?;
            upsert_setting(&mut *conn, SOCIAL_KEY, &social).await?;
            let company_ids = ensure_companies(&mut *conn, &data.companies).await?;
            insert_employees(&mut *conn, &data.employees, &company_ids).await?;
            insert_payroll_rows(&mut *conn, "payroll_inputs", &data.payroll_inputs).await?;
            insert_payroll_rows(&mut *conn, "payroll_results", &data.payroll_results).await?;
            Ok::<_, RepositoryError>(())
        }
        .boxed()
    })
    .await?;

    info!(
        target: "payroll",
        event = "backup_imported",
        backend = "relational",
        source_format = result.source_format.as_str(),
        employees = result.imported_employees,
        companies = result.imported_companies
    );
    Ok(result)
}

/// Empties the business tables and restores default settings. The migration
/// ledger is untouched.
pub(super) async fn clear_data(pool: &SqlitePool) -> RepoResult<ClearDataResult> {
    let social = serde_json::to_string(&SocialConfig::default())?;

    run_in_tx(pool, move |conn| {
        async move {
            delete_business_rows(&mut *conn).await?;
            upsert_setting(&mut *conn, ORG_NAME_KEY, DEFAULT_ORG_NAME).await?;
            upsert_setting(&mut *conn, SOCIAL_KEY, &social).await?;
            Ok::<_, RepositoryError>(())
        }
        .boxed()
    })
    .await?;

    info!(target: "payroll", event = "data_cleared", backend = "relational");
    Ok(cleared_tables())
}

async fn count_rows(pool: &SqlitePool, table: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table}"))
        .fetch_one(pool)
        .await
}

pub(super) async fn storage_info(pool: &SqlitePool, db_path: &Path) -> RepoResult<StorageInfo> {
    let file_size_bytes = std::fs::metadata(db_path).map(|meta| meta.len()).unwrap_or(0);
    Ok(StorageInfo {
        store_path: db_path.display().to_string(),
        schema_version: migrate::schema_version(pool).await?,
        file_size_bytes,
        employee_count: count_rows(pool, "employees").await?,
        company_count: count_rows(pool, "companies").await?,
        payroll_input_count: count_rows(pool, "payroll_inputs").await?,
        payroll_result_count: count_rows(pool, "payroll_results").await?,
    })
}
