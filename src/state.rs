use anyhow::Context;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::db::DatabaseClient;
use crate::legacy_store::StoreHandle;
use crate::migrate::{self, MigrationUnit};
use crate::repo::{create_payroll_repository, PayrollRepository};

/// Everything the command surface needs, built once at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub db: DatabaseClient,
    pub store: StoreHandle,
    pub repository: PayrollRepository,
}

impl AppState {
    /// Resolves the migrations directory, then opens the database and the
    /// legacy store described by `config`.
    pub async fn initialize(config: RuntimeConfig) -> anyhow::Result<Self> {
        let dir = migrate::resolve_migrations_dir(&migrate::default_migration_candidates())?;
        let migrations = migrate::load_migrations(&dir)?;
        Self::initialize_with(config, &migrations).await
    }

    pub async fn initialize_with(
        config: RuntimeConfig,
        migrations: &[MigrationUnit],
    ) -> anyhow::Result<Self> {
        let db = DatabaseClient::open(&config.db_path, migrations).await?;
        let store = match StoreHandle::open_file(&config.legacy_store_path) {
            Ok(store) => store,
            Err(err) => {
                db.close().await;
                return Err(err).context("open legacy store");
            }
        };
        let repository = create_payroll_repository(config.context, &db, store.clone());
        info!(
            target: "payroll",
            event = "app_state_ready",
            app_env = config.context.app_env.as_str(),
            read_source = config.context.read_source.as_str(),
            write_mode = config.context.write_mode.as_str(),
            db_path = %config.db_path.display()
        );
        Ok(Self {
            config,
            db,
            store,
            repository,
        })
    }

    /// Flushes the legacy store and closes the pool. Safe to call twice.
    pub async fn shutdown(&self) {
        if let Err(err) = self.store.close() {
            warn!(target: "payroll", event = "legacy_store_close_failed", error = %err);
        }
        self.db.close().await;
    }
}
