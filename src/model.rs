use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::defaults::{DEFAULT_ORG_NAME, DEFAULT_SOCIAL_CONFIG};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default, TS)]
#[ts(export)]
pub enum EmployeeType {
    #[default]
    #[serde(rename = "管理")]
    Management,
    #[serde(rename = "销售")]
    Sales,
}

impl EmployeeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeType::Management => "管理",
            EmployeeType::Sales => "销售",
        }
    }

    /// Unknown tokens map to `Management`.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        if token == "销售" || token.eq_ignore_ascii_case("sales") {
            EmployeeType::Sales
        } else {
            EmployeeType::Management
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Employee {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub id_card: String,
    pub company_short: String,
    pub company: String,
    pub dept: String,
    pub position: String,
    #[serde(rename = "type")]
    pub employee_type: EmployeeType,
    pub base_salary: f64,
    pub subsidy: f64,
    pub has_social: bool,
    pub has_local_pension: bool,
    pub fund_amount: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, TS)]
#[ts(export)]
pub struct Company {
    pub short: String,
    pub full: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SocialConfig {
    pub comp_pension: f64,
    pub comp_local_pension: f64,
    pub comp_unemploy: f64,
    pub comp_medical: f64,
    pub comp_injury: f64,
    pub comp_maternity: f64,
    pub worker_pension: f64,
    pub worker_unemploy: f64,
    pub worker_medical: f64,
    pub pension_base: f64,
    pub unemployment_base: f64,
    pub medical_base: f64,
    pub injury_base: f64,
    pub maternity_base: f64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        DEFAULT_SOCIAL_CONFIG
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrganizationSettings {
    pub org_name: String,
    pub social: SocialConfig,
    pub companies: Vec<Company>,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            org_name: DEFAULT_ORG_NAME.to_string(),
            social: SocialConfig::default(),
            companies: Vec::new(),
        }
    }
}

/// Month-keyed payroll input or result; the payload is opaque to this crate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PayrollPayloadRecord {
    pub id: String,
    #[ts(type = "number")]
    pub employee_id: i64,
    pub payroll_month: String,
    #[ts(type = "Record<string, unknown>")]
    pub payload: Map<String, Value>,
}

/// Canonical data set shared by backups, the legacy document and imports.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BackupData {
    pub org_name: String,
    pub social: SocialConfig,
    pub companies: Vec<Company>,
    pub employees: Vec<Employee>,
    pub payroll_inputs: Vec<PayrollPayloadRecord>,
    pub payroll_results: Vec<PayrollPayloadRecord>,
}

impl Default for BackupData {
    fn default() -> Self {
        let settings = OrganizationSettings::default();
        Self {
            org_name: settings.org_name,
            social: settings.social,
            companies: settings.companies,
            employees: Vec::new(),
            payroll_inputs: Vec::new(),
            payroll_results: Vec::new(),
        }
    }
}

impl BackupData {
    pub fn settings(&self) -> OrganizationSettings {
        OrganizationSettings {
            org_name: self.org_name.clone(),
            social: self.social,
            companies: self.companies.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SourceFormat {
    Legacy,
    Extended,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Legacy => "legacy",
            SourceFormat::Extended => "extended",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedBackup {
    pub source_format: SourceFormat,
    pub data: BackupData,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BackupEnvelope {
    pub version: u32,
    pub source: String,
    pub exported_at: String,
    pub data: BackupData,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportBackupResult {
    pub source_format: SourceFormat,
    #[ts(type = "number")]
    pub imported_companies: usize,
    #[ts(type = "number")]
    pub imported_employees: usize,
    #[ts(type = "number")]
    pub imported_payroll_inputs: usize,
    #[ts(type = "number")]
    pub imported_payroll_results: usize,
}

impl ImportBackupResult {
    pub fn from_normalized(normalized: &NormalizedBackup) -> Self {
        Self {
            source_format: normalized.source_format,
            imported_companies: normalized.data.companies.len(),
            imported_employees: normalized.data.employees.len(),
            imported_payroll_inputs: normalized.data.payroll_inputs.len(),
            imported_payroll_results: normalized.data.payroll_results.len(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, TS)]
#[ts(export)]
pub struct ReplaceEmployeesResult {
    #[ts(type = "number")]
    pub count: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClearDataResult {
    pub cleared_tables: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StorageInfo {
    pub store_path: String,
    #[ts(type = "number")]
    pub schema_version: i64,
    #[ts(type = "number")]
    pub file_size_bytes: u64,
    #[ts(type = "number")]
    pub employee_count: i64,
    #[ts(type = "number")]
    pub company_count: i64,
    #[ts(type = "number")]
    pub payroll_input_count: i64,
    #[ts(type = "number")]
    pub payroll_result_count: i64,
}
