//! Repository adapters over the relational store and the legacy document,
//! and the switching repository that routes between them.

use serde_json::Value;
use thiserror::Error;

use crate::config::RepositoryContext;
use crate::db::DatabaseClient;
use crate::legacy_store::{StoreError, StoreHandle};
use crate::migrate::MigrationError;
use crate::model::{
    BackupEnvelope, ClearDataResult, Employee, ImportBackupResult, OrganizationSettings,
    ReplaceEmployeesResult, StorageInfo,
};

pub mod legacy;
pub mod sqlite;
pub mod switching;

pub use legacy::{LegacyRepository, LEGACY_STATE_KEY};
pub use sqlite::SqliteRepository;
pub use switching::SwitchingRepository;

/// Tables holding business data, in delete order.
pub const BUSINESS_TABLES: &[&str] = &[
    "payroll_results",
    "payroll_inputs",
    "employees",
    "companies",
    "settings",
];

pub(crate) fn cleared_tables() -> ClearDataResult {
    ClearDataResult {
        cleared_tables: BUSINESS_TABLES.iter().map(|t| t.to_string()).collect(),
    }
}

/// Raised in dual mode when the relational write committed but the legacy
/// write failed. The relational side is not rolled back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Dual write inconsistent: mode=dual op={operation} requestId={request_id} cause={detail}")]
pub struct DualWriteError {
    pub operation: String,
    pub request_id: String,
    pub detail: String,
}

impl DualWriteError {
    pub fn mode(&self) -> &'static str {
        "dual"
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    DualWrite(#[from] DualWriteError),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// The contract both backends implement. Inputs are owned so each backend
/// gets its own copy.
#[allow(async_fn_in_trait)]
pub trait RepositoryAdapter {
    async fn get_settings(&self) -> RepoResult<OrganizationSettings>;
    async fn save_settings(&self, settings: OrganizationSettings) -> RepoResult<()>;
    async fn list_employees(&self) -> RepoResult<Vec<Employee>>;
    async fn replace_employees(&self, employees: Vec<Employee>)
        -> RepoResult<ReplaceEmployeesResult>;
    async fn export_backup(&self) -> RepoResult<BackupEnvelope>;
    async fn import_backup(&self, payload: Value) -> RepoResult<ImportBackupResult>;
    async fn clear_data(&self) -> RepoResult<ClearDataResult>;
    async fn get_storage_info(&self) -> RepoResult<StorageInfo>;
}

pub type PayrollRepository = SwitchingRepository<LegacyRepository, SqliteRepository>;

pub fn create_payroll_repository(
    context: RepositoryContext,
    db: &DatabaseClient,
    store: StoreHandle,
) -> PayrollRepository {
    let relational = SqliteRepository::new(db.pool.clone(), db.db_path.clone());
    let store_path = store
        .path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| ":memory:".to_string());
    let legacy = LegacyRepository::new(store, store_path, db.schema_version);
    SwitchingRepository::new(context, legacy, relational)
}
