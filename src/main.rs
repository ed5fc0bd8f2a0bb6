use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

use payroll_lib::commands::{self, DbRuntimeInfo};
use payroll_lib::config::RuntimeConfig;
use payroll_lib::logging::LOG_DIR_ENV;
use payroll_lib::model::{Employee, StorageInfo};
use payroll_lib::{AppError, AppState};

#[derive(Debug, Parser)]
#[command(name = "payroll", about = "Payroll data store maintenance", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database inspection and maintenance.
    #[command(subcommand)]
    Db(DbCommand),
    /// Backup export and import.
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Business data maintenance.
    #[command(subcommand)]
    Data(DataCommand),
    /// Employee listing.
    #[command(subcommand)]
    Employees(EmployeesCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Show runtime configuration, schema version and row counts.
    Status {
        /// Emit JSON instead of the table view.
        #[arg(long)]
        json: bool,
    },
    /// Apply pending migrations and list what was applied.
    Migrate,
    /// Delete all business rows. Requires APP_ENV=test.
    Reset,
}

#[derive(Debug, Subcommand)]
enum BackupCommand {
    /// Export a backup envelope to stdout or to a file.
    Export {
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Replace all business data with the contents of a backup file.
    Import {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum DataCommand {
    /// Delete all business data and restore default settings.
    Clear,
}

#[derive(Debug, Subcommand)]
enum EmployeesCommand {
    /// List employees from the configured read source.
    List {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let guard = install_logging();
    let code = match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            print_app_error(&AppError::from(err));
            1
        }
    };
    // `process::exit` skips destructors; flush the file writer first.
    drop(guard);
    process::exit(code);
}

fn install_logging() -> Option<WorkerGuard> {
    let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|v| !v.is_empty()) else {
        payroll_lib::init_logging();
        return None;
    };
    match payroll_lib::init_file_logging(Path::new(&dir)) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("file logging unavailable, using stderr: {err:#}");
            payroll_lib::init_logging();
            None
        }
    }
}

async fn run(command: Commands) -> Result<i32> {
    let config = RuntimeConfig::from_env().context("resolve runtime configuration")?;
    let state = AppState::initialize(config)
        .await
        .context("initialize payroll store")?;
    let outcome = dispatch(&state, command).await;
    state.shutdown().await;
    match outcome {
        Ok(code) => Ok(code),
        Err(err) => {
            print_app_error(&err);
            Ok(1)
        }
    }
}

async fn dispatch(state: &AppState, command: Commands) -> Result<i32, AppError> {
    match command {
        Commands::Db(DbCommand::Status { json }) => {
            let runtime = commands::db_runtime_info(state).await?;
            let storage = commands::storage_info(state).await?;
            if json {
                let payload = serde_json::json!({ "runtime": runtime, "storage": storage });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_status_table(&runtime, &storage);
            }
            Ok(0)
        }
        Commands::Db(DbCommand::Migrate) => {
            if state.db.applied_migrations.is_empty() {
                println!("No pending migrations.");
            } else {
                for name in &state.db.applied_migrations {
                    println!("applied {name}");
                }
            }
            println!("Schema version: {}", state.db.schema_version);
            Ok(0)
        }
        Commands::Db(DbCommand::Reset) => {
            let cleared = commands::db_reset(state).await?;
            println!("Cleared: {}", cleared.cleared_tables.join(", "));
            Ok(0)
        }
        Commands::Backup(BackupCommand::Export { out: Some(path) }) => {
            let cwd = std::env::current_dir()?;
            let saved = commands::backup_save_file(state, &cwd, Some(path)).await?;
            println!("Backup written to {} ({} bytes)", saved.file_path, saved.bytes_written);
            Ok(0)
        }
        Commands::Backup(BackupCommand::Export { out: None }) => {
            let envelope = commands::backup_export(state).await?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(0)
        }
        Commands::Backup(BackupCommand::Import { path }) => {
            let result = commands::backup_open_file(state, &path).await?;
            println!(
                "Imported {} backup: {} companies, {} employees, {} payroll inputs, {} payroll results",
                result.source_format.as_str(),
                result.imported_companies,
                result.imported_employees,
                result.imported_payroll_inputs,
                result.imported_payroll_results
            );
            Ok(0)
        }
        Commands::Data(DataCommand::Clear) => {
            let cleared = commands::data_clear(state).await?;
            println!("Cleared: {}", cleared.cleared_tables.join(", "));
            Ok(0)
        }
        Commands::Employees(EmployeesCommand::List { json }) => {
            let employees = commands::employees_list(state).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&employees)?);
            } else {
                print_employee_table(&employees);
            }
            Ok(0)
        }
    }
}

fn print_app_error(err: &AppError) {
    eprintln!("Error: {}", err);
    let mut cause = err.cause();
    while let Some(inner) = cause {
        eprintln!("  caused by: {}", inner);
        cause = inner.cause();
    }
}

fn print_status_table(runtime: &DbRuntimeInfo, storage: &StorageInfo) {
    println!("Payroll store status");
    println!("Environment    : {}", runtime.app_env.as_str());
    println!("Read source    : {}", runtime.read_source.as_str());
    println!("Write mode     : {}", runtime.write_mode.as_str());
    println!("Database       : {}", runtime.db_path);
    println!("Legacy store   : {}", runtime.legacy_store_path);
    println!("Schema version : {}", runtime.schema_version);
    println!("Journal mode   : {}", runtime.journal_mode);
    println!("Foreign keys   : {}", if runtime.foreign_keys { "on" } else { "off" });
    println!("File size      : {} bytes", storage.file_size_bytes);

    println!("\n{:<16} {:>8}", "Table", "Rows");
    println!("{:<16} {:>8}", "companies", storage.company_count);
    println!("{:<16} {:>8}", "employees", storage.employee_count);
    println!("{:<16} {:>8}", "payroll_inputs", storage.payroll_input_count);
    println!("{:<16} {:>8}", "payroll_results", storage.payroll_result_count);
}

fn print_employee_table(employees: &[Employee]) {
    if employees.is_empty() {
        println!("No employees.");
        return;
    }
    println!("{:>5}  {:<12} {:<10} {:<6} {:>12}", "ID", "Name", "Company", "Type", "Base salary");
    for employee in employees {
        println!(
            "{:>5}  {:<12} {:<10} {:<6} {:>12.2}",
            employee.id,
            employee.name,
            employee.company_short,
            employee.employee_type.as_str(),
            employee.base_salary
        );
    }
}
