#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use payroll_lib::commands;
use payroll_lib::import::ConflictDecision;
use serde_json::json;
use tempfile::tempdir;

mod util;

#[tokio::test]
async fn preview_then_apply_with_decisions() {
    let dir = tempdir().unwrap();
    let state = util::app_state(dir.path(), "relational", "relational").await;
    commands::backup_import(
        &state,
        json!({"data": {"employees": [
            {"id": 1, "name": "Ann", "idCard": "A1", "baseSalary": 1000},
            {"id": 3, "name": "Bo", "idCard": "B3", "baseSalary": 3000},
        ]}}),
    )
    .await
    .unwrap();

    let preview = commands::employees_import_preview(
        &state,
        vec![
            json!({"姓名": "Ann", "身份证号": "A1", "基本工资": 1500}),
            json!({"姓名": "Bo", "身份证号": "B3", "基本工资": 3500}),
            json!({"姓名": "Cy", "身份证号": "C9", "公司简称": "AC", "公司全称": "Acme"}),
            json!({"姓名": "", "身份证号": "X"}),
        ],
    )
    .await
    .unwrap();
    assert_eq!(preview.rows.len(), 3);
    assert_eq!(preview.errors, vec!["第 5 行：姓名不能为空"]);
    let conflict_rows: Vec<usize> = preview.conflicts.iter().map(|c| c.row.row_number).collect();
    assert_eq!(conflict_rows, vec![2, 3]);

    let decisions = HashMap::from([(2, ConflictDecision::Overwrite), (3, ConflictDecision::Skip)]);
    let applied = commands::employees_import_apply(&state, preview.rows, decisions)
        .await
        .unwrap();
    assert_eq!(applied.summary.inserted, 1);
    assert_eq!(applied.summary.overwritten, 1);
    assert_eq!(applied.summary.skipped, 1);
    assert_eq!(applied.count, 3);

    let employees = commands::employees_list(&state).await.unwrap();
    let view: Vec<(i64, &str, f64)> = employees
        .iter()
        .map(|e| (e.id, e.name.as_str(), e.base_salary))
        .collect();
    assert_eq!(view, vec![(1, "Ann", 1500.0), (2, "Cy", 0.0), (3, "Bo", 3000.0)]);
    assert!(employees[1].has_social);

    let settings = commands::settings_get(&state).await.unwrap();
    assert!(settings.companies.iter().any(|c| c.short == "AC" && c.full == "Acme"));
    state.shutdown().await;
}

#[tokio::test]
async fn unlisted_conflicts_are_skipped() {
    let dir = tempdir().unwrap();
    let state = util::app_state(dir.path(), "legacy", "legacy").await;
    commands::backup_import(
        &state,
        json!({"employees": [{"id": 1, "name": "Ann", "idCard": "A1", "baseSalary": 1000}]}),
    )
    .await
    .unwrap();

    let preview = commands::employees_import_preview(
        &state,
        vec![json!({"姓名": "Ann", "身份证号": "A1", "基本工资": 9999})],
    )
    .await
    .unwrap();
    let applied = commands::employees_import_apply(&state, preview.rows, HashMap::new())
        .await
        .unwrap();
    assert_eq!(applied.summary.skipped, 1);
    assert_eq!(commands::employees_list(&state).await.unwrap()[0].base_salary, 1000.0);
    state.shutdown().await;
}
