use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::rows::EmployeeImportRow;
use crate::defaults::IdAllocator;
use crate::model::Employee;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ConflictDecision {
    Overwrite,
    Skip,
}

/// An import row whose natural key matches an existing employee.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportConflict {
    pub row: EmployeeImportRow,
    pub existing: Employee,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictScan {
    pub conflicts: Vec<ImportConflict>,
    pub accepted_rows: Vec<EmployeeImportRow>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MergeSummary {
    #[ts(type = "number")]
    pub inserted: usize,
    #[ts(type = "number")]
    pub overwritten: usize,
    #[ts(type = "number")]
    pub skipped: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MergeOutcome {
    pub employees: Vec<Employee>,
    pub summary: MergeSummary,
}

fn natural_key(name: &str, id_card: &str) -> (String, String) {
    (name.trim().to_string(), id_card.trim().to_string())
}

/// Splits `rows` into conflicts with `existing` and rows free to insert.
/// When several existing employees share a key, the last one is matched.
pub fn find_conflicts(existing: &[Employee], rows: &[EmployeeImportRow]) -> ConflictScan {
    let by_key: HashMap<(String, String), &Employee> = existing
        .iter()
        .map(|employee| (natural_key(&employee.name, &employee.id_card), employee))
        .collect();

    let mut scan = ConflictScan::default();
    for row in rows {
        match by_key.get(&natural_key(&row.name, &row.id_card)) {
            Some(employee) => scan.conflicts.push(ImportConflict {
                row: row.clone(),
                existing: (*employee).clone(),
            }),
            None => scan.accepted_rows.push(row.clone()),
        }
    }
    scan
}

/// Accepted rows get fresh ids first, then each conflict is settled by
/// `resolve`. Overwrites keep the existing employee's id.
pub fn merge_import_rows<F>(
    existing: &[Employee],
    rows: &[EmployeeImportRow],
    mut resolve: F,
) -> MergeOutcome
where
    F: FnMut(&ImportConflict) -> ConflictDecision,
{
    let scan = find_conflicts(existing, rows);
    let mut by_id: BTreeMap<i64, Employee> = existing
        .iter()
        .map(|employee| (employee.id, employee.clone()))
        .collect();
    let mut ids = IdAllocator::with_used(by_id.keys().copied());
    let mut summary = MergeSummary::default();

    for row in &scan.accepted_rows {
        let id = ids.next_id();
        by_id.insert(id, row.to_employee(id));
        summary.inserted += 1;
    }

    for conflict in &scan.conflicts {
        match resolve(conflict) {
            ConflictDecision::Skip => summary.skipped += 1,
            ConflictDecision::Overwrite => {
                let id = conflict.existing.id;
                by_id.insert(id, conflict.row.to_employee(id));
                summary.overwritten += 1;
            }
        }
    }

    MergeOutcome {
        employees: by_id.into_values().collect(),
        summary,
    }
}
