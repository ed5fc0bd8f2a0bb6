use serde_json::{json, Value};
use tracing::info;

use crate::backup::{build_backup_export, ensure_company_coverage, normalize_backup_payload};
use crate::defaults::{normalize_employee_list, normalize_settings_input};
use crate::legacy_store::StoreHandle;
use crate::model::{
    BackupData, BackupEnvelope, ClearDataResult, Employee, ImportBackupResult,
    OrganizationSettings, ReplaceEmployeesResult, StorageInfo,
};
use crate::repo::{cleared_tables, RepoResult, RepositoryAdapter};

pub const LEGACY_STATE_KEY: &str = "legacy.repository.state.v1";

/// Backend over the single JSON document kept under [`LEGACY_STATE_KEY`].
#[derive(Debug, Clone)]
pub struct LegacyRepository {
    store: StoreHandle,
    store_path: String,
    schema_version: i64,
}

impl LegacyRepository {
    pub fn new(store: StoreHandle, store_path: impl Into<String>, schema_version: i64) -> Self {
        Self {
            store,
            store_path: store_path.into(),
            schema_version,
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Reads and re-normalizes the document. It is stored in the extended
    /// shape, so it is wrapped in `data` to keep payroll arrays.
    fn read_state(&self) -> RepoResult<BackupData> {
        Ok(match self.store.get(LEGACY_STATE_KEY)? {
            Some(state) => normalize_backup_payload(&json!({ "data": state })).data,
            None => BackupData::default(),
        })
    }

    fn write_state(&self, state: &BackupData) -> RepoResult<()> {
        self.store.put(LEGACY_STATE_KEY, serde_json::to_value(state)?)?;
        Ok(())
    }
}

impl RepositoryAdapter for LegacyRepository {
    async fn get_settings(&self) -> RepoResult<OrganizationSettings> {
        Ok(self.read_state()?.settings())
    }

    async fn save_settings(&self, settings: OrganizationSettings) -> RepoResult<()> {
        let mut state = self.read_state()?;
        let settings = normalize_settings_input(&settings)?;
        state.org_name = settings.org_name;
        state.social = settings.social;
        state.companies = settings.companies;
        self.write_state(&state)
    }

    async fn list_employees(&self) -> RepoResult<Vec<Employee>> {
        Ok(self.read_state()?.employees)
    }

    async fn replace_employees(&self, employees: Vec<Employee>) -> RepoResult<ReplaceEmployeesResult> {
        let mut state = self.read_state()?;
        let employees = normalize_employee_list(&employees)?;
        state.companies = ensure_company_coverage(state.companies, &employees);
        state.employees = employees;
        state.payroll_inputs.clear();
        state.payroll_results.clear();
        self.write_state(&state)?;
        Ok(ReplaceEmployeesResult {
            count: state.employees.len(),
        })
    }

    async fn export_backup(&self) -> RepoResult<BackupEnvelope> {
        Ok(build_backup_export(self.read_state()?))
    }

    async fn import_backup(&self, payload: Value) -> RepoResult<ImportBackupResult> {
        let normalized = normalize_backup_payload(&payload);
        self.write_state(&normalized.data)?;
        let result = ImportBackupResult::from_normalized(&normalized);
        info!(
            target: "payroll",
            event = "backup_imported",
            backend = "legacy",
            source_format = result.source_format.as_str(),
            employees = result.imported_employees,
            companies = result.imported_companies
        );
        Ok(result)
    }

    async fn clear_data(&self) -> RepoResult<ClearDataResult> {
        self.write_state(&BackupData::default())?;
        info!(target: "payroll", event = "data_cleared", backend = "legacy");
        Ok(cleared_tables())
    }

    async fn get_storage_info(&self) -> RepoResult<StorageInfo> {
        let state = self.read_state()?;
        Ok(StorageInfo {
            store_path: self.store_path.clone(),
            schema_version: self.schema_version,
            file_size_bytes: 0,
            employee_count: state.employees.len() as i64,
            company_count: state.companies.len() as i64,
            payroll_input_count: state.payroll_inputs.len() as i64,
            payroll_result_count: state.payroll_results.len() as i64,
        })
    }
}
