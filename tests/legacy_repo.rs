#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;

use payroll_lib::legacy_store::StoreHandle;
use payroll_lib::model::{OrganizationSettings, SourceFormat};
use payroll_lib::repo::{LegacyRepository, RepositoryAdapter, RepositoryError, LEGACY_STATE_KEY};
use serde_json::{json, Value};
use tempfile::tempdir;

#[tokio::test]
async fn state_survives_reopening_the_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("payroll-system.json");

    let store = StoreHandle::open_file(&path).unwrap();
    let repo = LegacyRepository::new(store.clone(), path.display().to_string(), 2);
    let result = repo
        .import_backup(json!({
            "orgName": "Acme",
            "companies": [{"short": "AC", "full": "Acme Co"}],
            "employees": [{"id": 3, "name": "Ann", "companyShort": "AC", "hasSocial": true}],
        }))
        .await
        .unwrap();
    assert_eq!(result.source_format, SourceFormat::Legacy);
    store.close().unwrap();

    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw[LEGACY_STATE_KEY]["orgName"], json!("Acme"));

    let reopened = LegacyRepository::new(
        StoreHandle::open_file(&path).unwrap(),
        path.display().to_string(),
        2,
    );
    let employees = reopened.list_employees().await.unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0].company, "Acme Co");
    assert!(employees[0].has_social);
    let info = reopened.get_storage_info().await.unwrap();
    assert_eq!(info.company_count, 1);
    assert_eq!(info.store_path, path.display().to_string());
}

#[tokio::test]
async fn save_settings_keeps_employees_and_payroll() {
    let repo = LegacyRepository::new(StoreHandle::in_memory(), ":memory:", 2);
    repo.import_backup(json!({
        "data": {
            "employees": [{"id": 1, "name": "Ann"}],
            "payrollResults": [{"id": "r1", "employeeId": 1, "payrollMonth": "2024-02", "payload": {"net": 1}}],
        }
    }))
    .await
    .unwrap();

    let mut settings = OrganizationSettings::default();
    settings.org_name = "Renamed".into();
    repo.save_settings(settings).await.unwrap();

    let backup = repo.export_backup().await.unwrap();
    assert_eq!(backup.data.org_name, "Renamed");
    assert_eq!(backup.data.employees.len(), 1);
    assert_eq!(backup.data.payroll_results[0].payload["net"], json!(1));
}

#[tokio::test]
async fn clear_data_resets_the_document() {
    let repo = LegacyRepository::new(StoreHandle::in_memory(), ":memory:", 2);
    repo.import_backup(json!({"employees": [{"name": "Ann"}]}))
        .await
        .unwrap();
    repo.clear_data().await.unwrap();
    assert!(repo.list_employees().await.unwrap().is_empty());
    assert_eq!(repo.get_settings().await.unwrap(), OrganizationSettings::default());
}

#[tokio::test]
async fn unwritable_store_surfaces_a_store_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();
    let path = blocker.join("payroll-system.json");

    let repo = LegacyRepository::new(
        StoreHandle::open_file(&path).unwrap(),
        path.display().to_string(),
        2,
    );
    let err = repo.clear_data().await.unwrap_err();
    assert!(matches!(err, RepositoryError::Store(_)));
}

#[tokio::test]
async fn failed_write_leaves_the_document_unchanged() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();
    let path = blocker.join("payroll-system.json");
    let store = StoreHandle::open_file(&path).unwrap();
    store
        .set(LEGACY_STATE_KEY, json!({"orgName": "Before", "employees": [{"id": 1, "name": "Ann"}]}))
        .unwrap();
    let repo = LegacyRepository::new(store.clone(), path.display().to_string(), 2);

    let mut settings = OrganizationSettings::default();
    settings.org_name = "After".into();
    let err = repo.save_settings(settings).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Store(_)));
    assert!(repo.clear_data().await.is_err());

    assert_eq!(repo.get_settings().await.unwrap().org_name, "Before");
    assert_eq!(repo.list_employees().await.unwrap().len(), 1);
    assert_eq!(
        store.get(LEGACY_STATE_KEY).unwrap().unwrap()["orgName"],
        json!("Before")
    );
}
