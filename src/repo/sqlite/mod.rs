use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};

use crate::model::{
    BackupEnvelope, ClearDataResult, Company, Employee, ImportBackupResult, OrganizationSettings,
    ReplaceEmployeesResult, StorageInfo,
};
use crate::repo::{RepoResult, RepositoryAdapter};

mod backup;
mod employees;
mod settings;

/// Relational backend over the migrated SQLite schema.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool, db_path: PathBuf) -> Self {
        Self { pool, db_path }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl RepositoryAdapter for SqliteRepository {
    async fn get_settings(&self) -> RepoResult<OrganizationSettings> {
        Ok(settings::read_settings(&self.pool).await?)
    }

    async fn save_settings(&self, settings: OrganizationSettings) -> RepoResult<()> {
        settings::write_settings(&self.pool, settings).await
    }

    async fn list_employees(&self) -> RepoResult<Vec<Employee>> {
        employees::read_employees(&self.pool).await
    }

    async fn replace_employees(&self, employees: Vec<Employee>) -> RepoResult<ReplaceEmployeesResult> {
        employees::replace_employees(&self.pool, employees).await
    }

    async fn export_backup(&self) -> RepoResult<BackupEnvelope> {
        backup::export_backup(&self.pool).await
    }

    async fn import_backup(&self, payload: Value) -> RepoResult<ImportBackupResult> {
        backup::import_backup(&self.pool, payload).await
    }

    async fn clear_data(&self) -> RepoResult<ClearDataResult> {
        backup::clear_data(&self.pool).await
    }

    async fn get_storage_info(&self) -> RepoResult<StorageInfo> {
        backup::storage_info(&self.pool, &self.db_path).await
    }
}

fn to_company_id(short: &str) -> String {
    format!("company:{short}")
}

/// Parses a stored JSON column; anything but an object yields an empty map.
fn parse_json_record(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

async fn upsert_setting(conn: &mut SqliteConnection, key: &str, value: &str) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) \
         VALUES (?, ?, CURRENT_TIMESTAMP) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Upserts companies by `company:<short>` id and returns short -> id.
async fn ensure_companies(
    conn: &mut SqliteConnection,
    companies: &[Company],
) -> sqlx::Result<HashMap<String, String>> {
    let mut ids = HashMap::new();
    for company in companies {
        let short = company.short.trim();
        if short.is_empty() {
            continue;
        }
        let id = to_company_id(short);
        sqlx::query(
            "INSERT INTO companies (id, short, full, created_at, updated_at) \
             VALUES (?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP) \
             ON CONFLICT(id) DO UPDATE SET short = excluded.short, full = excluded.full, \
             updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&id)
        .bind(short)
        .bind(&company.full)
        .execute(&mut *conn)
        .await?;
        ids.insert(short.to_string(), id);
    }
    Ok(ids)
}

async fn insert_employees(
    conn: &mut SqliteConnection,
    employees: &[Employee],
    company_ids: &HashMap<String, String>,
) -> sqlx::Result<()> {
    for employee in employees {
        sqlx::query(
            "INSERT INTO employees (\
               id, name, id_number, company_id, department, position, employee_type, \
               base_salary, subsidy, has_social, has_local_pension, fund_amount, \
               created_at, updated_at\
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        )
        .bind(employee.id)
        .bind(&employee.name)
        .bind(&employee.id_card)
        .bind(company_ids.get(&employee.company_short).cloned())
        .bind(&employee.dept)
        .bind(&employee.position)
        .bind(employee.employee_type.as_str())
        .bind(employee.base_salary)
        .bind(employee.subsidy)
        .bind(employee.has_social as i64)
        .bind(employee.has_local_pension as i64)
        .bind(employee.fund_amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
