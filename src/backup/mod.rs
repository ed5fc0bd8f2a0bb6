//! Backup normalization: any JSON value in, canonical data set out.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::defaults::{
    normalize_companies, normalize_employees, normalize_social_config, DEFAULT_ORG_NAME,
};
use crate::model::{
    BackupData, BackupEnvelope, Company, Employee, NormalizedBackup, PayrollPayloadRecord,
    SourceFormat,
};
use crate::normalize::{as_non_empty_string_or, resolve_company_full_name};

pub mod file;
mod payload;

pub use payload::normalize_payroll_records;

pub const BACKUP_VERSION: u32 = 2;
pub const BACKUP_SOURCE: &str = "payroll-system";

/// Normalizes an untrusted backup or legacy document. Never fails: anything
/// unrecognised is replaced by defaults or dropped.
pub fn normalize_backup_payload(value: &Value) -> NormalizedBackup {
    let empty = Map::new();
    let record = value.as_object().unwrap_or(&empty);
    let nested = record.get("data").and_then(Value::as_object);
    let source_format = if nested.is_some() {
        SourceFormat::Extended
    } else {
        SourceFormat::Legacy
    };
    let payload = nested.unwrap_or(record);

    let employees = normalize_employees(payload.get("employees"));
    let companies = ensure_company_coverage(normalize_companies(payload.get("companies")), &employees);
    let employees = harmonize_employees(employees, &companies);

    let (payroll_inputs, payroll_results) = match source_format {
        SourceFormat::Extended => {
            let known: HashSet<i64> = employees.iter().map(|employee| employee.id).collect();
            (
                retain_known(normalize_payroll_records(payload.get("payrollInputs")), &known),
                retain_known(normalize_payroll_records(payload.get("payrollResults")), &known),
            )
        }
        SourceFormat::Legacy => (Vec::new(), Vec::new()),
    };

    NormalizedBackup {
        source_format,
        data: BackupData {
            org_name: as_non_empty_string_or(payload.get("orgName"), DEFAULT_ORG_NAME),
            social: normalize_social_config(payload.get("social")),
            companies,
            employees,
            payroll_inputs,
            payroll_results,
        },
    }
}

/// Appends a company for every short code referenced by an employee but
/// missing from `companies`.
pub fn ensure_company_coverage(mut companies: Vec<Company>, employees: &[Employee]) -> Vec<Company> {
    let mut known: HashSet<String> = companies.iter().map(|c| c.short.clone()).collect();
    for employee in employees {
        if employee.company_short.is_empty() || known.contains(&employee.company_short) {
            continue;
        }
        known.insert(employee.company_short.clone());
        companies.push(Company {
            short: employee.company_short.clone(),
            full: resolve_company_full_name(&employee.company_short, &employee.company),
        });
    }
    companies
}

/// Rewrites each employee's display company from the reconciled list.
pub fn harmonize_employees(employees: Vec<Employee>, companies: &[Company]) -> Vec<Employee> {
    employees
        .into_iter()
        .map(|mut employee| {
            if employee.company_short.is_empty() {
                return employee;
            }
            employee.company = companies
                .iter()
                .find(|company| company.short == employee.company_short)
                .map(|company| company.full.clone())
                .unwrap_or_else(|| {
                    resolve_company_full_name(&employee.company_short, &employee.company)
                });
            employee
        })
        .collect()
}

/// Keeps records whose employee survived normalization; the first record
/// wins when ids repeat.
fn retain_known(records: Vec<PayrollPayloadRecord>, known: &HashSet<i64>) -> Vec<PayrollPayloadRecord> {
    let mut seen_ids = HashSet::new();
    records
        .into_iter()
        .filter(|record| known.contains(&record.employee_id))
        .filter(|record| seen_ids.insert(record.id.clone()))
        .collect()
}

pub fn build_backup_export(data: BackupData) -> BackupEnvelope {
    BackupEnvelope {
        version: BACKUP_VERSION,
        source: BACKUP_SOURCE.to_string(),
        exported_at: crate::time::now_rfc3339(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_payload_is_legacy_and_drops_payroll() {
        let normalized = normalize_backup_payload(&json!({
            "orgName": "Acme",
            "employees": [{"name": "A"}],
            "payrollInputs": [{"employeeId": 1, "payrollMonth": "2024-01"}],
        }));
        assert_eq!(normalized.source_format, SourceFormat::Legacy);
        assert_eq!(normalized.data.org_name, "Acme");
        assert_eq!(normalized.data.employees.len(), 1);
        assert!(normalized.data.payroll_inputs.is_empty());
    }

    #[test]
    fn nested_data_is_extended() {
        let normalized = normalize_backup_payload(&json!({
            "version": 2,
            "data": {
                "employees": [{"id": 4, "name": "A"}],
                "payrollInputs": [
                    {"id": "in-1", "employeeId": 4, "payrollMonth": "2024-01", "payload": {"hours": 160}},
                    {"id": "in-1", "employeeId": 4, "payrollMonth": "2024-02"},
                    {"id": "in-2", "employeeId": 9, "payrollMonth": "2024-01"},
                    {"employeeId": "4"},
                    {"employeeId": "nope"},
                ],
            }
        }));
        assert_eq!(normalized.source_format, SourceFormat::Extended);
        let inputs = &normalized.data.payroll_inputs;
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].id, "in-1");
        assert_eq!(inputs[0].payload.get("hours"), Some(&json!(160)));
        assert_eq!(inputs[1].id, "payload-4");
        assert_eq!(inputs[1].payroll_month, "");
        assert!(inputs[1].payload.is_empty());
    }

    #[test]
    fn missing_company_is_synthesized_and_harmonized() {
        let normalized = normalize_backup_payload(&json!({
            "companies": [{"short": "AC", "full": "Acme"}],
            "employees": [
                {"id": 1, "name": "A", "companyShort": "ZZ"},
                {"id": 2, "name": "B", "companyShort": "YY", "company": "Why Co"},
                {"id": 3, "name": "C", "companyShort": "AC", "company": "stale"},
            ],
        }));
        let data = normalized.data;
        assert_eq!(
            data.companies,
            vec![
                Company { short: "AC".into(), full: "Acme".into() },
                Company { short: "ZZ".into(), full: "ZZ".into() },
                Company { short: "YY".into(), full: "Why Co".into() },
            ]
        );
        assert_eq!(data.employees[0].company, "ZZ");
        assert_eq!(data.employees[1].company, "Why Co");
        assert_eq!(data.employees[2].company, "Acme");
    }

    #[test]
    fn garbage_input_yields_defaults() {
        for value in [json!(null), json!(42), json!("text"), json!([1, 2])] {
            let normalized = normalize_backup_payload(&value);
            assert_eq!(normalized.source_format, SourceFormat::Legacy);
            assert_eq!(normalized.data, BackupData::default());
        }
    }

    #[test]
    fn export_envelope_is_versioned() {
        let envelope = build_backup_export(BackupData::default());
        assert_eq!(envelope.version, 2);
        assert_eq!(envelope.source, "payroll-system");
        assert!(envelope.exported_at.ends_with('Z'));

        let value = serde_json::to_value(&envelope).unwrap();
        let renormalized = normalize_backup_payload(&value);
        assert_eq!(renormalized.source_format, SourceFormat::Extended);
        assert_eq!(renormalized.data, envelope.data);
    }
}
