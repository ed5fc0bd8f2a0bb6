use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::config::{ReadSource, RepositoryContext, WriteMode};
use crate::model::{
    BackupEnvelope, ClearDataResult, Employee, ImportBackupResult, OrganizationSettings,
    ReplaceEmployeesResult, StorageInfo,
};
use crate::repo::{
    DualWriteError, LegacyRepository, RepoResult, RepositoryAdapter, SqliteRepository,
};

/// Routes reads by `read_source` and writes by `write_mode`. Holds no data of
/// its own.
#[derive(Debug, Clone)]
pub struct SwitchingRepository<L = LegacyRepository, R = SqliteRepository> {
    context: RepositoryContext,
    legacy: L,
    relational: R,
}

impl<L, R> SwitchingRepository<L, R> {
    pub fn new(context: RepositoryContext, legacy: L, relational: R) -> Self {
        Self {
            context,
            legacy,
            relational,
        }
    }

    pub fn context(&self) -> RepositoryContext {
        self.context
    }

    pub fn legacy(&self) -> &L {
        &self.legacy
    }

    pub fn relational(&self) -> &R {
        &self.relational
    }
}

fn request_id() -> String {
    format!("req-{}", Uuid::now_v7())
}

macro_rules! read_by_source {
    ($self:ident, $method:ident) => {
        match $self.context.read_source {
            ReadSource::Legacy => $self.legacy.$method().await,
            ReadSource::Relational => $self.relational.$method().await,
        }
    };
}

// Dual mode writes the relational store first. A legacy failure after that
// leaves the two stores diverged and is surfaced, never compensated.
macro_rules! write_by_mode {
    ($self:ident, $operation:literal, $method:ident($($arg:ident),*)) => {
        match $self.context.write_mode {
            WriteMode::Legacy => $self.legacy.$method($($arg),*).await,
            WriteMode::Relational => $self.relational.$method($($arg),*).await,
            WriteMode::Dual => {
                let request_id = request_id();
                let result = $self.relational.$method($($arg.clone()),*).await?;
                if let Err(err) = $self.legacy.$method($($arg),*).await {
                    warn!(
                        target: "payroll",
                        event = "dual_write_inconsistent",
                        mode = "dual",
                        operation = $operation,
                        request_id = %request_id,
                        error = %err
                    );
                    return Err(DualWriteError {
                        operation: $operation.to_string(),
                        request_id,
                        detail: err.to_string(),
                    }
                    .into());
                }
                Ok(result)
            }
        }
    };
}

impl<L, R> RepositoryAdapter for SwitchingRepository<L, R>
where
    L: RepositoryAdapter,
    R: RepositoryAdapter,
{
    async fn get_settings(&self) -> RepoResult<OrganizationSettings> {
        read_by_source!(self, get_settings)
    }

    async fn save_settings(&self, settings: OrganizationSettings) -> RepoResult<()> {
        write_by_mode!(self, "saveSettings", save_settings(settings))
    }

    async fn list_employees(&self) -> RepoResult<Vec<Employee>> {
        read_by_source!(self, list_employees)
    }

    async fn replace_employees(&self, employees: Vec<Employee>) -> RepoResult<ReplaceEmployeesResult> {
        write_by_mode!(self, "replaceEmployees", replace_employees(employees))
    }

    async fn export_backup(&self) -> RepoResult<BackupEnvelope> {
        read_by_source!(self, export_backup)
    }

    async fn import_backup(&self, payload: Value) -> RepoResult<ImportBackupResult> {
        write_by_mode!(self, "importBackup", import_backup(payload))
    }

    async fn clear_data(&self) -> RepoResult<ClearDataResult> {
        write_by_mode!(self, "clearData", clear_data())
    }

    /// Always describes the relational store, whatever the read source.
    async fn get_storage_info(&self) -> RepoResult<StorageInfo> {
        self.relational.get_storage_info().await
    }
}
