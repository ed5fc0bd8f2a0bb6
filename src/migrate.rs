use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{error, info};
use ts_rs::TS;

use crate::time::now_rfc3339;

pub const MIGRATIONS_DIR_ENV: &str = "PAYROLL_MIGRATIONS_DIR";
const LEDGER_TABLE: &str = "schema_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Cannot resolve migrations directory. Tried: {}", display_paths(.tried))]
    DirNotFound { tried: Vec<PathBuf> },
    #[error("read migrations from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("migration {name} edited after application")]
    ChecksumMismatch { name: String },
    #[error("migration {name} failed at `{statement}`: {source}")]
    Statement {
        name: String,
        statement: String,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One named schema script, e.g. `0001_init.sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub name: String,
    pub sql: String,
}

impl MigrationUnit {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }

    /// SHA-256 of the script with comment and blank lines removed.
    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(strip_comments(&self.sql).as_bytes()))
    }

    pub fn statements(&self) -> Vec<String> {
        split_stmts(&self.sql)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MigrationRecord {
    pub name: String,
    pub applied_at: String,
    pub checksum: Option<String>,
}

fn strip_comments(sql: &str) -> String {
    sql.lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.is_empty() || t.starts_with("--"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a migration into statements on `;`. Quoted text and trigger bodies
/// (`BEGIN ... END`) stay whole. Only full-line `--` comments are removed, so a
/// trailing comment must not contain a quote or `;`.
pub fn split_stmts(sql: &str) -> Vec<String> {
    let mut stmts = Vec::new();
    let mut current = String::new();
    let mut word = String::new();
    let mut scan = StmtScan::default();
    let mut quote: Option<char> = None;

    for ch in strip_comments(sql).chars() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' {
            word.push(ch);
            current.push(ch);
            continue;
        }
        scan.word(&mut word);
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            ';' if scan.depth == 0 => {
                push_stmt(&mut stmts, &current);
                current.clear();
                scan = StmtScan::default();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    push_stmt(&mut stmts, &current);
    stmts
}

fn push_stmt(stmts: &mut Vec<String>, raw: &str) {
    let stmt = raw.trim();
    let tx_control = ["BEGIN", "BEGIN TRANSACTION", "COMMIT"]
        .iter()
        .any(|kw| stmt.eq_ignore_ascii_case(kw));
    if !stmt.is_empty() && !tx_control {
        stmts.push(stmt.to_string());
    }
}

/// Keyword state of the statement being split; `depth` counts open
/// `BEGIN`/`CASE` blocks inside a `CREATE TRIGGER`.
#[derive(Default)]
struct StmtScan {
    words: usize,
    create: bool,
    trigger: bool,
    depth: usize,
}

impl StmtScan {
    fn word(&mut self, word: &mut String) {
        if word.is_empty() {
            return;
        }
        let upper = word.to_ascii_uppercase();
        word.clear();
        self.words += 1;
        if self.words == 1 {
            self.create = upper == "CREATE";
        } else if self.create && self.words <= 4 && upper == "TRIGGER" {
            self.trigger = true;
        }
        if self.trigger {
            match upper.as_str() {
                "BEGIN" | "CASE" => self.depth += 1,
                "END" => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
    }
}

fn preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\t'], " ");
    let trimmed = one_line.trim();
    match trimmed.char_indices().nth(160) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Loads every `*.sql` file in `dir`, sorted by file name.
pub fn load_migrations(dir: &Path) -> Result<Vec<MigrationUnit>, MigrationError> {
    let read_err = |source| MigrationError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut units = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".sql") || !path.is_file() {
            continue;
        }
        let sql = std::fs::read_to_string(&path).map_err(|source| MigrationError::Read {
            path: path.clone(),
            source,
        })?;
        units.push(MigrationUnit::new(name, sql));
    }
    units.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(units)
}

/// Candidate directories in lookup order: the env override, next to the
/// executable, the working directory, then the crate checkout.
pub fn default_migration_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::var_os(MIGRATIONS_DIR_ENV).filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(dir));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(exe_dir.join("migrations"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("migrations"));
    }
    candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"));
    candidates
}

pub fn resolve_migrations_dir(candidates: &[PathBuf]) -> Result<PathBuf, MigrationError> {
    candidates
        .iter()
        .find(|candidate| candidate.is_dir())
        .cloned()
        .ok_or_else(|| MigrationError::DirNotFound {
            tried: candidates.to_vec(),
        })
}

/// Creates the ledger table if absent and upgrades ledgers that predate the
/// checksum column.
pub async fn ensure_migration_table(pool: &SqlitePool) -> Result<(), MigrationError> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (\
           name TEXT PRIMARY KEY,\
           applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,\
           checksum TEXT\
         )"
    ))
    .execute(pool)
    .await?;

    let has_checksum: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT 1 FROM pragma_table_info('{LEDGER_TABLE}') WHERE name='checksum'"
    ))
    .fetch_optional(pool)
    .await?;
    if has_checksum.is_none() {
        sqlx::query(&format!("ALTER TABLE {LEDGER_TABLE} ADD COLUMN checksum TEXT"))
            .execute(pool)
            .await?;
        info!(target: "payroll", event = "migration_ledger_upgraded");
    }
    Ok(())
}

pub async fn applied_migrations(pool: &SqlitePool) -> Result<Vec<MigrationRecord>, MigrationError> {
    ensure_migration_table(pool).await?;
    let rows = sqlx::query(&format!(
        "SELECT name, applied_at, checksum FROM {LEDGER_TABLE} ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|row| -> Result<MigrationRecord, MigrationError> {
            Ok(MigrationRecord {
                name: row.try_get("name")?,
                applied_at: row.try_get("applied_at")?,
                checksum: row.try_get("checksum")?,
            })
        })
        .collect()
}

/// Number of applied units. Safe on an empty database.
pub async fn schema_version(pool: &SqlitePool) -> Result<i64, MigrationError> {
    ensure_migration_table(pool).await?;
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {LEDGER_TABLE}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Applies every unit not yet in the ledger, in name order, one transaction
/// per unit. Returns the names applied by this call.
pub async fn run_migrations(
    pool: &SqlitePool,
    units: &[MigrationUnit],
) -> Result<Vec<String>, MigrationError> {
    ensure_migration_table(pool).await?;

    let mut ordered: Vec<&MigrationUnit> = units.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    // Rows written before checksums existed get the current file's checksum.
    for unit in &ordered {
        sqlx::query(&format!(
            "UPDATE {LEDGER_TABLE} SET checksum = ? WHERE name = ? AND checksum IS NULL"
        ))
        .bind(unit.checksum())
        .bind(&unit.name)
        .execute(pool)
        .await?;
    }

    let applied: HashMap<String, Option<String>> = applied_migrations(pool)
        .await?
        .into_iter()
        .map(|record| (record.name, record.checksum))
        .collect();

    let mut newly_applied = Vec::new();
    for unit in ordered {
        let checksum = unit.checksum();
        if let Some(stored) = applied.get(&unit.name) {
            if stored.as_deref().is_some_and(|stored| stored != checksum) {
                error!(target: "payroll", event = "migration_checksum_mismatch", file = %unit.name);
                return Err(MigrationError::ChecksumMismatch {
                    name: unit.name.clone(),
                });
            }
            info!(target: "payroll", event = "migration_skip_file", file = %unit.name);
            continue;
        }

        apply_unit(pool, unit, &checksum).await?;
        newly_applied.push(unit.name.clone());
    }

    Ok(newly_applied)
}

async fn apply_unit(
    pool: &SqlitePool,
    unit: &MigrationUnit,
    checksum: &str,
) -> Result<(), MigrationError> {
    let mut tx = pool.begin().await?;
    for stmt in unit.statements() {
        info!(target: "payroll", event = "migration_stmt", file = %unit.name, sql = %preview(&stmt));
        if let Err(e) = sqlx::query(&stmt).execute(&mut *tx).await {
            error!(
                target: "payroll",
                event = "migration_stmt_error",
                file = %unit.name,
                sql = %preview(&stmt),
                error = %e
            );
            // Dropping `tx` rolls the unit back; make it explicit for the log.
            if let Err(rb) = tx.rollback().await {
                error!(target: "payroll", event = "db_tx_rollback_failed", error = %rb);
            }
            return Err(MigrationError::Statement {
                name: unit.name.clone(),
                statement: preview(&stmt),
                source: e,
            });
        }
    }

    sqlx::query(&format!(
        "INSERT INTO {LEDGER_TABLE} (name, applied_at, checksum) VALUES (?, ?, ?)"
    ))
    .bind(&unit.name)
    .bind(now_rfc3339())
    .bind(checksum)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(target: "payroll", event = "migration_file_applied", file = %unit.name);
    Ok(())
}
