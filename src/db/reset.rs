use futures::FutureExt;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppEnv;
use crate::db::run_in_tx;
use crate::model::ClearDataResult;
use crate::repo::BUSINESS_TABLES;

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("resetDatabase is only allowed when APP_ENV=test")]
    NotAllowed,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Deletes every row from the business tables that exist. Test mode only;
/// the migration ledger is left alone.
pub async fn reset_database(app_env: AppEnv, pool: &SqlitePool) -> Result<ClearDataResult, ResetError> {
    if app_env != AppEnv::Test {
        warn!(target: "payroll", event = "db_reset_rejected", app_env = app_env.as_str());
        return Err(ResetError::NotAllowed);
    }

    let existing: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;
    let tables: Vec<String> = BUSINESS_TABLES
        .iter()
        .filter(|table| existing.iter().any(|name| name == *table))
        .map(|table| table.to_string())
        .collect();

    let to_clear = tables.clone();
    run_in_tx(pool, move |conn| {
        async move {
            for table in &to_clear {
                sqlx::query(&format!("DELETE FROM {table}"))
                    .execute(&mut *conn)
                    .await?;
            }
            Ok::<_, ResetError>(())
        }
        .boxed()
    })
    .await?;

    info!(target: "payroll", event = "db_reset", tables = ?tables);
    Ok(ClearDataResult {
        cleared_tables: tables,
    })
}
