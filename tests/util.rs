#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use payroll_lib::config::{resolve_runtime_config, RuntimeConfig};
use payroll_lib::migrate::{load_migrations, MigrationUnit};
use payroll_lib::AppState;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{fmt, EnvFilter};

pub async fn temp_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    pool
}

pub fn migrations_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

pub fn shipped_migrations() -> Vec<MigrationUnit> {
    load_migrations(&migrations_dir()).expect("load shipped migrations")
}

/// Test-mode configuration rooted in `dir`.
pub fn test_config(dir: &Path, read_source: &str, write_mode: &str) -> RuntimeConfig {
    let db_path = dir.join("payroll.sqlite").display().to_string();
    let data_dir = dir.display().to_string();
    let vars = [
        ("APP_ENV", "test".to_string()),
        ("READ_SOURCE", read_source.to_string()),
        ("WRITE_MODE", write_mode.to_string()),
        ("TEST_DB_PATH", db_path),
        ("PAYROLL_DATA_DIR", data_dir),
    ];
    resolve_runtime_config(
        |key| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.clone())
        },
        dir,
    )
}

pub async fn app_state(dir: &Path, read_source: &str, write_mode: &str) -> AppState {
    AppState::initialize_with(test_config(dir, read_source, write_mode), &shipped_migrations())
        .await
        .expect("initialize app state")
}

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Captures JSON log lines for the current thread until the guard drops.
pub fn capture_logs() -> (Arc<Mutex<Vec<u8>>>, DefaultGuard) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = buffer.clone();
    let subscriber = fmt()
        .with_env_filter(EnvFilter::new("payroll=debug"))
        .with_writer(move || BufferWriter(writer.clone()))
        .json()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

pub fn logs_to_string(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buffer.lock().unwrap().clone()).expect("log utf8")
}
