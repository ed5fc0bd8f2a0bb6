use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "PAYROLL_LOG";
pub const LOG_DIR_ENV: &str = "PAYROLL_LOG_DIR";
pub const DEFAULT_LOG_FILTER: &str = "payroll=info,sqlx=warn";
pub const LOG_FILE_PREFIX: &str = "payroll.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// JSON logs to stderr. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .try_init();
}

/// JSON logs to a daily-rolling file under `dir`. Keep the guard alive for
/// the life of the process or buffered lines are lost.
pub fn init_file_logging(dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .try_init()
        .map_err(|err| anyhow::anyhow!("install file logger: {err}"))?;
    Ok(guard)
}
