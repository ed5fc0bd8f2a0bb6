//! Total coercion helpers from untyped JSON into typed domain values.
//!
//! Every helper returns a fallback instead of failing, so normalization of
//! backup files, legacy documents and import rows never errors on bad input.

use serde_json::{Map, Value};

use crate::model::EmployeeType;

/// Largest integer that survives a round trip through a JSON number.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

const TRUE_TOKENS: &[&str] = &["true", "1", "yes", "y", "是"];
const FALSE_TOKENS: &[&str] = &["false", "0", "no", "n", "否"];

pub fn as_record(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

/// Returns the first of `keys` whose value is present and not `null`.
pub fn pick<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

/// Trimmed string form of a scalar. Missing, `null` and compound values yield
/// an empty string.
pub fn as_string(value: Option<&Value>) -> String {
    as_string_or(value, "")
}

pub fn as_string_or(value: Option<&Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => format_number(number),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => fallback.to_string(),
    }
}

/// Like [`as_string_or`] but an empty result also falls back.
pub fn as_non_empty_string_or(value: Option<&Value>, fallback: &str) -> String {
    let text = as_string(value);
    if text.is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

fn format_number(number: &serde_json::Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    if let Some(uint) = number.as_u64() {
        return uint.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER => {
            format!("{}", float as i64)
        }
        Some(float) => float.to_string(),
        None => number.to_string(),
    }
}

/// Finite number from a JSON number or a numeric string.
pub fn as_number(value: Option<&Value>, fallback: f64) -> f64 {
    parse_number(value).unwrap_or(fallback)
}

/// Number clamped to zero or more; negative input becomes `0`.
pub fn as_amount(value: Option<&Value>) -> f64 {
    as_number(value, 0.0).max(0.0)
}

pub(crate) fn parse_number(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(number)) => number.as_f64().filter(|n| n.is_finite()),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

pub fn as_bool(value: Option<&Value>, fallback: bool) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(fallback),
        Some(Value::String(text)) => {
            let lowered = text.trim().to_lowercase();
            if TRUE_TOKENS.contains(&lowered.as_str()) {
                true
            } else if FALSE_TOKENS.contains(&lowered.as_str()) {
                false
            } else {
                fallback
            }
        }
        _ => fallback,
    }
}

/// Strictly positive integer; fractional, zero, negative or oversized values
/// yield `None`.
pub fn as_positive_int(value: Option<&Value>) -> Option<i64> {
    let number = parse_number(value)?;
    if number < 1.0 || number.fract() != 0.0 || number > MAX_SAFE_INTEGER {
        return None;
    }
    Some(number as i64)
}

pub fn normalize_employee_type(value: Option<&Value>) -> EmployeeType {
    EmployeeType::from_token(&as_string(value))
}

pub fn resolve_company_full_name(short: &str, full: &str) -> String {
    if full.is_empty() {
        short.to_string()
    } else {
        full.to_string()
    }
}
