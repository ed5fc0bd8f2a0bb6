//! Header-keyed spreadsheet rows in and out of the employee model.
//!
//! The spreadsheet codec lives in the UI; this module sees each sheet row as
//! a JSON object keyed by the column headers below.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use ts_rs::TS;

use crate::model::{Employee, EmployeeType};
use crate::normalize::{as_bool, as_number, as_string, normalize_employee_type, resolve_company_full_name};

pub const EMPLOYEE_IMPORT_HEADERS: [&str; 12] = [
    "姓名",
    "身份证号",
    "公司简称",
    "公司全称",
    "部门",
    "职位",
    "人员类型",
    "基本工资",
    "补助",
    "是否社保",
    "是否地方养老",
    "公积金金额",
];

const NAME: &str = "姓名";
const ID_CARD: &str = "身份证号";
const COMPANY_SHORT: &str = "公司简称";
const COMPANY_FULL: &str = "公司全称";
const DEPT: &str = "部门";
const POSITION: &str = "职位";
const EMPLOYEE_TYPE: &str = "人员类型";
const BASE_SALARY: &str = "基本工资";
const SUBSIDY: &str = "补助";
const HAS_SOCIAL: &str = "是否社保";
const HAS_LOCAL_PENSION: &str = "是否地方养老";
const FUND_AMOUNT: &str = "公积金金额";

/// Sheet row 1 holds the headers.
const FIRST_DATA_ROW: usize = 2;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EmployeeImportRow {
    #[ts(type = "number")]
    pub row_number: usize,
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

impl EmployeeImportRow {
    pub fn to_employee(&self, id: i64) -> Employee {
        Employee {
            id,
            name: self.name.clone(),
            id_card: self.id_card.clone(),
            company_short: self.company_short.clone(),
            company: resolve_company_full_name(&self.company_short, &self.company),
            dept: self.dept.clone(),
            position: self.position.clone(),
            employee_type: self.employee_type,
            base_salary: self.base_salary,
            subsidy: self.subsidy,
            has_social: self.has_social,
            has_local_pension: self.has_social && self.has_local_pension,
            fund_amount: self.fund_amount,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("第 {row} 行：姓名不能为空")]
    MissingName { row: usize },
    #[error("第 {row} 行：{field}必须为数字")]
    NotNumeric { row: usize, field: &'static str },
    #[error("第 {row} 行：不是有效的数据行")]
    NotARecord { row: usize },
}

impl RowError {
    pub fn row(&self) -> usize {
        match self {
            RowError::MissingName { row }
            | RowError::NotNumeric { row, .. }
            | RowError::NotARecord { row } => *row,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRows {
    pub rows: Vec<EmployeeImportRow>,
    pub errors: Vec<RowError>,
}

/// Blank cells count as numeric; they parse to zero.
fn is_numeric_like(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Number(number)) => number.as_f64().is_some_and(f64::is_finite),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            trimmed.is_empty() || trimmed.parse::<f64>().is_ok_and(f64::is_finite)
        }
        Some(_) => false,
    }
}

fn parse_row(record: &Map<String, Value>, row: usize) -> Result<EmployeeImportRow, RowError> {
    let name = as_string(record.get(NAME));
    if name.is_empty() {
        return Err(RowError::MissingName { row });
    }
    for field in [BASE_SALARY, SUBSIDY, FUND_AMOUNT] {
        if !is_numeric_like(record.get(field)) {
            return Err(RowError::NotNumeric { row, field });
        }
    }

    let company_short = as_string(record.get(COMPANY_SHORT));
    let company = resolve_company_full_name(&company_short, &as_string(record.get(COMPANY_FULL)));
    let has_social = as_bool(record.get(HAS_SOCIAL), true);
    let has_local_pension = has_social && as_bool(record.get(HAS_LOCAL_PENSION), true);

    Ok(EmployeeImportRow {
        row_number: row,
        name,
        id_card: as_string(record.get(ID_CARD)),
        company_short,
        company,
        dept: as_string(record.get(DEPT)),
        position: as_string(record.get(POSITION)),
        employee_type: normalize_employee_type(record.get(EMPLOYEE_TYPE)),
        base_salary: as_number(record.get(BASE_SALARY), 0.0),
        subsidy: as_number(record.get(SUBSIDY), 0.0),
        has_social,
        has_local_pension,
        fund_amount: as_number(record.get(FUND_AMOUNT), 0.0),
    })
}

/// Validates decoded sheet rows. Invalid rows are reported and left out;
/// the rest keep their sheet row number.
pub fn parse_employee_rows(records: &[Value]) -> ParsedRows {
    let mut parsed = ParsedRows::default();
    for (index, record) in records.iter().enumerate() {
        let row = index + FIRST_DATA_ROW;
        let outcome = match record.as_object() {
            Some(record) => parse_row(record, row),
            None => Err(RowError::NotARecord { row }),
        };
        match outcome {
            Ok(parsed_row) => parsed.rows.push(parsed_row),
            Err(err) => parsed.errors.push(err),
        }
    }
    parsed
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "是"
    } else {
        "否"
    }
}

pub fn export_rows(employees: &[Employee]) -> Vec<Map<String, Value>> {
    employees
        .iter()
        .map(|employee| {
            let mut row = Map::new();
            row.insert(NAME.into(), json!(employee.name));
            row.insert(ID_CARD.into(), json!(employee.id_card));
            row.insert(COMPANY_SHORT.into(), json!(employee.company_short));
            row.insert(COMPANY_FULL.into(), json!(employee.company));
            row.insert(DEPT.into(), json!(employee.dept));
            row.insert(POSITION.into(), json!(employee.position));
            row.insert(EMPLOYEE_TYPE.into(), json!(employee.employee_type.as_str()));
            row.insert(BASE_SALARY.into(), json!(employee.base_salary));
            row.insert(SUBSIDY.into(), json!(employee.subsidy));
            row.insert(HAS_SOCIAL.into(), json!(yes_no(employee.has_social)));
            row.insert(HAS_LOCAL_PENSION.into(), json!(yes_no(employee.has_local_pension)));
            row.insert(FUND_AMOUNT.into(), json!(employee.fund_amount));
            row
        })
        .collect()
}

/// Sample row written under the headers of a blank import template.
pub fn template_row() -> Map<String, Value> {
    let mut row = Map::new();
    row.insert(NAME.into(), json!("示例员工"));
    row.insert(ID_CARD.into(), json!("110101199001010000"));
    row.insert(COMPANY_SHORT.into(), json!("AC"));
    row.insert(COMPANY_FULL.into(), json!("Acme Co"));
    row.insert(DEPT.into(), json!("HR"));
    row.insert(POSITION.into(), json!("Manager"));
    row.insert(EMPLOYEE_TYPE.into(), json!(EmployeeType::Management.as_str()));
    row.insert(BASE_SALARY.into(), json!(10000));
    row.insert(SUBSIDY.into(), json!(500));
    row.insert(HAS_SOCIAL.into(), json!("是"));
    row.insert(HAS_LOCAL_PENSION.into(), json!("是"));
    row.insert(FUND_AMOUNT.into(), json!(300));
    row
}
