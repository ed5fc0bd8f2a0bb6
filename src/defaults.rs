//! Default values and entity-level normalizers for settings, companies and
//! employees.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use crate::model::{Company, Employee, OrganizationSettings, SocialConfig};
use crate::normalize::{
    as_amount, as_bool, as_non_empty_string_or, as_number, as_positive_int, as_record, as_string,
    normalize_employee_type, pick, resolve_company_full_name,
};

pub const DEFAULT_ORG_NAME: &str = "公司名称";

pub const DEFAULT_SOCIAL_CONFIG: SocialConfig = SocialConfig {
    comp_pension: 16.0,
    comp_local_pension: 1.0,
    comp_unemploy: 0.8,
    comp_medical: 5.0,
    comp_injury: 0.4,
    comp_maternity: 0.5,
    worker_pension: 8.0,
    worker_unemploy: 0.2,
    worker_medical: 2.0,
    pension_base: 4775.0,
    unemployment_base: 3000.0,
    medical_base: 6727.0,
    injury_base: 3000.0,
    maternity_base: 6727.0,
};

/// Hands out employee ids: a requested id is honoured when unused, anything
/// else gets the smallest unused positive integer.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    used: BTreeSet<i64>,
    cursor: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            used: BTreeSet::new(),
            cursor: 1,
        }
    }

    /// Seeds the allocator with ids that are already taken.
    pub fn with_used<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        let mut allocator = Self::new();
        allocator.used.extend(ids.into_iter().filter(|id| *id > 0));
        allocator
    }

    pub fn is_used(&self, id: i64) -> bool {
        self.used.contains(&id)
    }

    pub fn claim(&mut self, requested: Option<i64>) -> i64 {
        match requested {
            Some(id) if id > 0 && !self.used.contains(&id) => {
                self.used.insert(id);
                id
            }
            _ => self.next_id(),
        }
    }

    pub fn next_id(&mut self) -> i64 {
        // `used` only grows, so the smallest free id never moves backwards.
        self.cursor = self.cursor.max(1);
        while self.used.contains(&self.cursor) {
            self.cursor += 1;
        }
        let id = self.cursor;
        self.used.insert(id);
        id
    }
}

pub fn normalize_social_config(value: Option<&Value>) -> SocialConfig {
    let Some(record) = as_record(value) else {
        return DEFAULT_SOCIAL_CONFIG;
    };
    let d = DEFAULT_SOCIAL_CONFIG;
    let field = |key: &str, fallback: f64| as_number(record.get(key), fallback);

    SocialConfig {
        comp_pension: field("compPension", d.comp_pension),
        comp_local_pension: field("compLocalPension", d.comp_local_pension),
        comp_unemploy: field("compUnemploy", d.comp_unemploy),
        comp_medical: field("compMedical", d.comp_medical),
        comp_injury: field("compInjury", d.comp_injury),
        comp_maternity: field("compMaternity", d.comp_maternity),
        worker_pension: field("workerPension", d.worker_pension),
        worker_unemploy: field("workerUnemploy", d.worker_unemploy),
        worker_medical: field("workerMedical", d.worker_medical),
        pension_base: field("pensionBase", d.pension_base),
        unemployment_base: field("unemploymentBase", d.unemployment_base),
        medical_base: field("medicalBase", d.medical_base),
        injury_base: field("injuryBase", d.injury_base),
        maternity_base: field("maternityBase", d.maternity_base),
    }
}

/// Companies deduplicated by trimmed short code; entries without one are
/// dropped.
pub fn normalize_companies(value: Option<&Value>) -> Vec<Company> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut companies = Vec::new();
    for item in items {
        let Some(record) = item.as_object() else {
            continue;
        };
        let short = as_string(record.get("short"));
        if short.is_empty() || !seen.insert(short.clone()) {
            continue;
        }
        let full = resolve_company_full_name(&short, &as_string(record.get("full")));
        companies.push(Company { short, full });
    }
    companies
}

/// Employees with a non-empty name, unique ids and clamped amounts, sorted by
/// id. Snake-case and alternate field names are accepted.
pub fn normalize_employees(value: Option<&Value>) -> Vec<Employee> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut ids = IdAllocator::new();
    let mut employees = Vec::new();
    for item in items {
        let Some(record) = item.as_object() else {
            continue;
        };
        let name = as_string(record.get("name"));
        if name.is_empty() {
            continue;
        }

        let requested = as_positive_int(record.get("id"))
            .or_else(|| as_positive_int(record.get("employeeId")))
            .or_else(|| as_positive_int(record.get("employee_id")));
        let id = ids.claim(requested);

        let company_short = as_string(pick(record, &["companyShort", "company_short"]));
        let company = resolve_company_full_name(&company_short, &as_string(record.get("company")));
        let has_social = as_bool(pick(record, &["hasSocial", "has_social"]), false);
        let has_local_pension =
            has_social && as_bool(pick(record, &["hasLocalPension", "has_local_pension"]), false);

        employees.push(Employee {
            id,
            name,
            id_card: as_string(pick(record, &["idCard", "id_number"])),
            company_short,
            company,
            dept: as_string(pick(record, &["dept", "department"])),
            position: as_string(record.get("position")),
            employee_type: normalize_employee_type(pick(record, &["type", "employee_type"])),
            base_salary: as_amount(pick(record, &["baseSalary", "base_salary"])),
            subsidy: as_amount(record.get("subsidy")),
            has_social,
            has_local_pension,
            fund_amount: as_amount(pick(record, &["fundAmount", "fund_amount"])),
        });
    }

    employees.sort_by_key(|employee| employee.id);
    employees
}

/// Re-normalizes an already typed list, e.g. one received from the UI.
pub fn normalize_employee_list(employees: &[Employee]) -> Result<Vec<Employee>, serde_json::Error> {
    let value = serde_json::to_value(employees)?;
    Ok(normalize_employees(Some(&value)))
}

pub fn normalize_settings(value: Option<&Value>) -> OrganizationSettings {
    let record = as_record(value);
    let get = |key: &str| record.and_then(|r| r.get(key));

    OrganizationSettings {
        org_name: as_non_empty_string_or(get("orgName"), DEFAULT_ORG_NAME),
        social: normalize_social_config(get("social")),
        companies: normalize_companies(get("companies")),
    }
}

pub fn normalize_settings_input(
    settings: &OrganizationSettings,
) -> Result<OrganizationSettings, serde_json::Error> {
    let value = serde_json::to_value(settings)?;
    Ok(normalize_settings(Some(&value)))
}

/// Companies implied by an employee set: one per distinct short code, in
/// first-seen order, full name falling back to the short code.
pub fn derive_companies(employees: &[Employee]) -> Vec<Company> {
    let mut seen = HashSet::new();
    employees
        .iter()
        .filter(|employee| !employee.company_short.is_empty())
        .filter(|employee| seen.insert(employee.company_short.clone()))
        .map(|employee| Company {
            short: employee.company_short.clone(),
            full: resolve_company_full_name(&employee.company_short, &employee.company),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn smallest_unused_id_is_allocated() {
        let employees = normalize_employees(Some(&json!([
            {"id": 5, "name": "A"},
            {"id": 2, "name": "B"},
            {"name": "C"},
        ])));
        let ids: Vec<(i64, &str)> = employees.iter().map(|e| (e.id, e.name.as_str())).collect();
        assert_eq!(ids, vec![(1, "C"), (2, "B"), (5, "A")]);
    }

    #[test]
    fn duplicate_ids_are_reassigned() {
        let employees = normalize_employees(Some(&json!([
            {"id": 2, "name": "A"},
            {"id": 2, "name": "B"},
        ])));
        let ids: Vec<(i64, &str)> = employees.iter().map(|e| (e.id, e.name.as_str())).collect();
        assert_eq!(ids, vec![(1, "B"), (2, "A")]);
    }

    #[test]
    fn employees_accept_aliases_and_loose_types() {
        let employees = normalize_employees(Some(&json!([{
            "employee_id": "7",
            "name": "  Dana ",
            "id_number": "110",
            "company_short": "AC",
            "department": "Ops",
            "employee_type": "sales",
            "base_salary": "3000",
            "subsidy": -20,
            "has_social": "是",
            "has_local_pension": "yes",
            "fund_amount": "abc",
        }])));
        let dana = &employees[0];
        assert_eq!(dana.id, 7);
        assert_eq!(dana.name, "Dana");
        assert_eq!(dana.id_card, "110");
        assert_eq!(dana.company_short, "AC");
        assert_eq!(dana.company, "AC");
        assert_eq!(dana.dept, "Ops");
        assert_eq!(dana.employee_type, crate::model::EmployeeType::Sales);
        assert_eq!(dana.base_salary, 3000.0);
        assert_eq!(dana.subsidy, 0.0);
        assert!(dana.has_social);
        assert!(dana.has_local_pension);
        assert_eq!(dana.fund_amount, 0.0);
    }

    #[test]
    fn local_pension_requires_social() {
        let employees = normalize_employees(Some(&json!([
            {"name": "E", "hasSocial": false, "hasLocalPension": true},
        ])));
        assert!(!employees[0].has_local_pension);
    }

    #[test]
    fn nameless_and_non_object_entries_are_dropped() {
        let employees = normalize_employees(Some(&json!([{"name": "  "}, 42, null, {"name": "F"}])));
        assert_eq!(employees.len(), 1);
        assert!(normalize_employees(Some(&json!({"name": "x"}))).is_empty());
    }

    #[test]
    fn companies_dedupe_by_short() {
        let companies = normalize_companies(Some(&json!([
            {"short": " AC ", "full": ""},
            {"short": "AC", "full": "Acme"},
            {"short": "", "full": "Nobody"},
            {"short": "BC", "full": "Beta Co"},
        ])));
        assert_eq!(
            companies,
            vec![
                Company { short: "AC".into(), full: "AC".into() },
                Company { short: "BC".into(), full: "Beta Co".into() },
            ]
        );
    }

    #[test]
    fn social_fields_default_independently() {
        let social = normalize_social_config(Some(&json!({
            "compPension": "12",
            "workerPension": null,
            "pensionBase": "n/a",
        })));
        assert_eq!(social.comp_pension, 12.0);
        assert_eq!(social.worker_pension, 8.0);
        assert_eq!(social.pension_base, 4775.0);
        assert_eq!(normalize_social_config(None), DEFAULT_SOCIAL_CONFIG);
    }

    #[test]
    fn settings_fall_back_to_placeholder_org() {
        let settings = normalize_settings(Some(&json!({"orgName": "   "})));
        assert_eq!(settings.org_name, DEFAULT_ORG_NAME);
        let settings = normalize_settings(Some(&json!({"orgName": " Acme "})));
        assert_eq!(settings.org_name, "Acme");
    }

    #[test]
    fn derive_companies_uses_first_occurrence() {
        let employees = normalize_employees(Some(&json!([
            {"id": 1, "name": "A", "companyShort": "AC", "company": "Acme"},
            {"id": 2, "name": "B", "companyShort": "AC", "company": "Other"},
            {"id": 3, "name": "C", "companyShort": "ZZ"},
            {"id": 4, "name": "D"},
        ])));
        let companies = derive_companies(&employees);
        assert_eq!(
            companies,
            vec![
                Company { short: "AC".into(), full: "Acme".into() },
                Company { short: "ZZ".into(), full: "ZZ".into() },
            ]
        );
    }

    #[test]
    fn typed_inputs_renormalize_through_json() {
        let mut employees = normalize_employees(Some(&json!([
            {"id": 2, "name": "B", "companyShort": "AC"},
            {"id": 1, "name": "A"},
        ])));
        employees[1].name = "  ".into();
        let employees = normalize_employee_list(&employees).unwrap();
        let names: Vec<&str> = employees.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A"]);
        assert_eq!(employees[0].id, 1);

        let settings = normalize_settings_input(&OrganizationSettings {
            org_name: "   ".into(),
            ..normalize_settings(None)
        })
        .unwrap();
        assert_eq!(settings.org_name, DEFAULT_ORG_NAME);
    }

    proptest! {
        #[test]
        fn allocator_never_repeats(requests in prop::collection::vec(prop::option::of(-3i64..20), 0..40)) {
            let mut allocator = IdAllocator::new();
            let mut seen = HashSet::new();
            for request in requests {
                let id = allocator.claim(request);
                prop_assert!(id >= 1);
                prop_assert!(seen.insert(id), "id {} handed out twice", id);
            }
        }

        #[test]
        fn allocation_fills_the_smallest_gap(taken in prop::collection::btree_set(1i64..30, 0..20)) {
            let mut allocator = IdAllocator::with_used(taken.iter().copied());
            let expected = (1..).find(|id| !taken.contains(id)).unwrap();
            prop_assert_eq!(allocator.next_id(), expected);
        }
    }
}
