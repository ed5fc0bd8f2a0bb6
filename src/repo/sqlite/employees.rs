use futures::FutureExt;
use sqlx::{Row, SqlitePool};

use super::{ensure_companies, insert_employees};
use crate::db::run_in_tx;
use crate::defaults::{derive_companies, normalize_employee_list};
use crate::model::{Employee, EmployeeType, ReplaceEmployeesResult};
use crate::repo::{RepoResult, RepositoryError};

pub(super) async fn read_employees(pool: &SqlitePool) -> RepoResult<Vec<Employee>> {
    let rows = sqlx::query(
        "SELECT e.id, e.name, e.id_number, e.department, e.position, e.employee_type, \
                e.base_salary, e.subsidy, e.has_social, e.has_local_pension, e.fund_amount, \
                c.short AS company_short, c.full AS company_full \
         FROM employees e \
         LEFT JOIN companies c ON c.id = e.company_id \
         ORDER BY e.id ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut employees = Vec::with_capacity(rows.len());
    for row in rows {
        let company_short: Option<String> = row.try_get("company_short")?;
        let company_full: Option<String> = row.try_get("company_full")?;
        let employee_type: String = row.try_get("employee_type")?;
        employees.push(Employee {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            id_card: row.try_get::<Option<String>, _>("id_number")?.unwrap_or_default(),
            company: company_full
                .or_else(|| company_short.clone())
                .unwrap_or_default(),
            company_short: company_short.unwrap_or_default(),
            dept: row.try_get::<Option<String>, _>("department")?.unwrap_or_default(),
            position: row.try_get::<Option<String>, _>("position")?.unwrap_or_default(),
            employee_type: EmployeeType::from_token(&employee_type),
            base_salary: row.try_get("base_salary")?,
            subsidy: row.try_get("subsidy")?,
            has_social: row.try_get::<i64, _>("has_social")? == 1,
            has_local_pension: row.try_get::<i64, _>("has_local_pension")? == 1,
            fund_amount: row.try_get("fund_amount")?,
        });
    }

    Ok(normalize_employee_list(&employees)?)
}

/// Full-set replace. Payroll rows belong to the old identities, so they are
/// deleted along with the employees.
pub(super) async fn replace_employees(
    pool: &SqlitePool,
    employees: Vec<Employee>,
) -> RepoResult<ReplaceEmployeesResult> {
    let employees = normalize_employee_list(&employees)?;
    let companies = derive_companies(&employees);
    let count = employees.len();

    run_in_tx(pool, move |conn| {
        async move {
            let company_ids = ensure_companies(&mut *conn, &companies).await?;
            for table in ["payroll_results", "payroll_inputs", "employees"] {
                sqlx::query(&format!("DELETE FROM {table}"))
                    .execute(&mut *conn)
                    .await?;
            }
            insert_employees(&mut *conn, &employees, &company_ids).await?;
            Ok::<_, RepositoryError>(())
        }
        .boxed()
    })
    .await?;

    tracing::info!(target: "payroll", event = "employees_replaced", count);
    Ok(ReplaceEmployeesResult { count })
}
