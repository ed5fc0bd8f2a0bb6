use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info, warn};
use ts_rs::TS;

use crate::migrate::{self, MigrationUnit};

pub mod reset;

pub async fn open_sqlite_pool(db_path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            error!(
                target: "payroll",
                event = "db_dir_create_failed",
                path = %parent.display(),
                error = %e
            );
            e
        })?;
    }
    info!(target: "payroll", event = "db_path", path = %db_path.display());

    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .after_connect(|conn, _| {
            Box::pin(async move {
                sqlx::query("PRAGMA wal_autocheckpoint = 1000;")
                    .execute(&mut *conn)
                    .await?;
                Ok::<_, sqlx::Error>(())
            })
        })
        .connect_with(opts)
        .await
        .with_context(|| format!("open sqlite database {}", db_path.display()))?;

    Ok(pool)
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DbPragmas {
    pub sqlite_version: String,
    pub journal_mode: String,
    pub foreign_keys: bool,
    #[ts(type = "number")]
    pub busy_timeout_ms: i64,
}

pub async fn read_pragmas(pool: &SqlitePool) -> DbPragmas {
    let (sqlite_version,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));
    let (journal_mode,): (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));
    let (foreign_keys,): (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .unwrap_or((0,));
    let (busy_timeout_ms,): (i64,) = sqlx::query_as("PRAGMA busy_timeout;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    DbPragmas {
        sqlite_version,
        journal_mode,
        foreign_keys: foreign_keys == 1,
        busy_timeout_ms,
    }
}

pub async fn log_effective_pragmas(pool: &SqlitePool) -> DbPragmas {
    let pragmas = read_pragmas(pool).await;
    info!(
        target: "payroll",
        event = "db_open",
        sqlite_version = %pragmas.sqlite_version,
        journal_mode = %pragmas.journal_mode,
        foreign_keys = pragmas.foreign_keys,
        busy_timeout_ms = pragmas.busy_timeout_ms
    );
    if !pragmas.journal_mode.eq_ignore_ascii_case("wal") {
        warn!(
            target: "payroll",
            event = "db_open_warning",
            msg = "journal_mode != WAL; running with reduced crash safety"
        );
    }
    pragmas
}

/// Run work inside a transaction. Commits on `Ok`, rolls back on `Err`.
///
/// The closure receives the transaction's connection and returns a boxed
/// future, e.g. `|conn| async move { ... }.boxed()`.
pub async fn run_in_tx<R, E, F>(pool: &SqlitePool, f: F) -> Result<R, E>
where
    E: From<sqlx::Error>,
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<R, E>>,
{
    let mut tx = pool.begin().await.map_err(E::from)?;
    info!(target: "payroll", event = "db_tx_begin");
    let outcome = f(&mut *tx).await;
    match outcome {
        Ok(val) => {
            tx.commit().await.map_err(E::from)?;
            info!(target: "payroll", event = "db_tx_commit");
            Ok(val)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                error!(target: "payroll", event = "db_tx_rollback_failed", error = %rb);
            } else {
                warn!(target: "payroll", event = "db_tx_rollback");
            }
            Err(e)
        }
    }
}

/// Replace `path` with `bytes` via a temp file in the same directory. The
/// parent directory must exist.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// The process-wide relational store: an open pool with its schema migrated.
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    pub pool: SqlitePool,
    pub db_path: PathBuf,
    pub applied_migrations: Vec<String>,
    pub schema_version: i64,
    pub pragmas: DbPragmas,
}

impl DatabaseClient {
    pub async fn open(db_path: &Path, migrations: &[MigrationUnit]) -> anyhow::Result<Self> {
        let pool = open_sqlite_pool(db_path).await?;
        let pragmas = log_effective_pragmas(&pool).await;
        let applied_migrations = match migrate::run_migrations(&pool, migrations).await {
            Ok(applied) => applied,
            Err(err) => {
                pool.close().await;
                return Err(err).context("apply migrations");
            }
        };
        let schema_version = migrate::schema_version(&pool).await?;
        info!(
            target: "payroll",
            event = "db_ready",
            path = %db_path.display(),
            schema_version,
            applied = applied_migrations.len()
        );
        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
            applied_migrations,
            schema_version,
            pragmas,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!(target: "payroll", event = "db_closed", path = %self.db_path.display());
    }
}
