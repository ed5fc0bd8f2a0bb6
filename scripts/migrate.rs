use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use payroll_lib::db::open_sqlite_pool;
use payroll_lib::migrate::{
    self, applied_migrations, default_migration_candidates, ensure_migration_table,
    load_migrations, resolve_migrations_dir, run_migrations, MigrationUnit,
};

#[derive(Parser)]
#[command(name = "migrate", about = "Payroll schema migration helper")]
struct Cli {
    /// Database file to migrate
    #[arg(long, value_name = "PATH")]
    db: PathBuf,

    /// Migrations directory; resolved from the usual candidates when omitted
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List migrations and show applied/pending
    List,
    /// Show current schema version and pending count
    Status,
    /// Apply pending migrations
    Up,
}

#[tokio::main]
async fn main() -> Result<()> {
    payroll_lib::init_logging();

    let cli = Cli::parse();
    let dir = match cli.dir {
        Some(dir) => dir,
        None => resolve_migrations_dir(&default_migration_candidates())?,
    };
    let units = load_migrations(&dir)?;

    match cli.cmd {
        Cmd::List => list(&cli.db, &units).await,
        Cmd::Status => status(&cli.db, &units).await,
        Cmd::Up => up(&cli.db, &units).await,
    }
}

async fn applied_map(db: &Path) -> Result<(sqlx::SqlitePool, HashMap<String, String>)> {
    let pool = open_sqlite_pool(db).await?;
    ensure_migration_table(&pool).await?;
    let applied = applied_migrations(&pool)
        .await?
        .into_iter()
        .map(|record| (record.name, record.applied_at))
        .collect();
    Ok((pool, applied))
}

async fn list(db: &Path, units: &[MigrationUnit]) -> Result<()> {
    let (pool, applied) = applied_map(db).await?;
    for unit in units {
        match applied.get(&unit.name) {
            Some(at) => println!("[x] {}  (applied {at})", unit.name),
            None => println!("[ ] {}", unit.name),
        }
    }
    pool.close().await;
    Ok(())
}

async fn status(db: &Path, units: &[MigrationUnit]) -> Result<()> {
    let (pool, applied) = applied_map(db).await?;
    let pending = units
        .iter()
        .filter(|unit| !applied.contains_key(&unit.name))
        .count();
    let version = migrate::schema_version(&pool).await?;
    println!("schema version: {version}");
    println!("applied: {}  pending: {pending}", applied.len());
    pool.close().await;
    Ok(())
}

async fn up(db: &Path, units: &[MigrationUnit]) -> Result<()> {
    let pool = open_sqlite_pool(db).await?;
    let outcome = run_migrations(&pool, units)
        .await
        .with_context(|| format!("migrate {}", db.display()));
    pool.close().await;
    let applied = outcome?;
    if applied.is_empty() {
        println!("up to date");
    } else {
        for name in applied {
            println!("applied {name}");
        }
    }
    Ok(())
}
