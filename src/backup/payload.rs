use serde_json::{Map, Value};

use crate::model::PayrollPayloadRecord;
use crate::normalize::{as_positive_int, as_record, as_string, as_string_or, pick};

/// Records without a positive-integer employee id are dropped; a missing id
/// becomes `payload-<position>` (1-based).
pub fn normalize_payroll_records(value: Option<&Value>) -> Vec<PayrollPayloadRecord> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| normalize_record(item, &format!("payload-{}", index + 1)))
        .collect()
}

fn normalize_record(item: &Value, fallback_id: &str) -> Option<PayrollPayloadRecord> {
    let record = item.as_object()?;
    let employee_id = as_positive_int(record.get("employeeId"))
        .or_else(|| as_positive_int(record.get("employee_id")))?;

    Some(PayrollPayloadRecord {
        id: as_string_or(record.get("id"), fallback_id),
        employee_id,
        payroll_month: as_string(pick(record, &["payrollMonth", "payroll_month"])),
        payload: as_record(record.get("payload")).cloned().unwrap_or_else(Map::new),
    })
}
