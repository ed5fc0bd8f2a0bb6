#![allow(clippy::unwrap_used, clippy::expect_used)]

use payroll_lib::db::open_sqlite_pool;
use payroll_lib::migrate::{
    applied_migrations, run_migrations, schema_version, MigrationError, MigrationUnit,
};
use tempfile::tempdir;

mod util;

#[tokio::test]
async fn migrations_are_idempotent() {
    let dir = tempdir().unwrap();
    let pool = open_sqlite_pool(&dir.path().join("idem.sqlite")).await.unwrap();
    let units = util::shipped_migrations();

    let first = run_migrations(&pool, &units).await.unwrap();
    assert_eq!(first, vec!["0001_init.sql", "0002_employee_id_integer.sql"]);
    let second = run_migrations(&pool, &units).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(schema_version(&pool).await.unwrap(), 2);

    let records = applied_migrations(&pool).await.unwrap();
    assert!(records.iter().all(|record| record.checksum.is_some()));
    assert!(records.iter().all(|record| record.applied_at.ends_with('Z')));
}

#[tokio::test]
async fn failing_unit_rolls_back_completely() {
    let dir = tempdir().unwrap();
    let pool = open_sqlite_pool(&dir.path().join("atomic.sqlite")).await.unwrap();
    let units = vec![
        MigrationUnit::new("0001_ok.sql", "CREATE TABLE a (id INTEGER);"),
        MigrationUnit::new(
            "0002_broken.sql",
            "CREATE TABLE b (id INTEGER);\nINSERT INTO missing_table VALUES (1);",
        ),
    ];

    let err = run_migrations(&pool, &units).await.unwrap_err();
    match err {
        MigrationError::Statement { name, .. } => assert_eq!(name, "0002_broken.sql"),
        other => panic!("unexpected error: {other:?}"),
    }

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name IN ('a','b')")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(tables, vec!["a"]);
    let names: Vec<String> = applied_migrations(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.name)
        .collect();
    assert_eq!(names, vec!["0001_ok.sql"]);
}

#[tokio::test]
async fn edited_migration_is_rejected() {
    let dir = tempdir().unwrap();
    let pool = open_sqlite_pool(&dir.path().join("edit.sqlite")).await.unwrap();
    run_migrations(&pool, &[MigrationUnit::new("0001_a.sql", "CREATE TABLE a (id INTEGER);")])
        .await
        .unwrap();

    let comment_only = MigrationUnit::new("0001_a.sql", "-- reworded\nCREATE TABLE a (id INTEGER);");
    assert!(run_migrations(&pool, &[comment_only]).await.unwrap().is_empty());

    let edited = MigrationUnit::new("0001_a.sql", "CREATE TABLE a (id INTEGER, x TEXT);");
    let err = run_migrations(&pool, &[edited]).await.unwrap_err();
    assert!(matches!(err, MigrationError::ChecksumMismatch { ref name } if name == "0001_a.sql"));
}

#[tokio::test]
async fn ledger_without_checksums_is_upgraded() {
    let dir = tempdir().unwrap();
    let pool = open_sqlite_pool(&dir.path().join("legacy-ledger.sqlite")).await.unwrap();
    sqlx::query(
        "CREATE TABLE schema_migrations (name TEXT PRIMARY KEY, applied_at TEXT DEFAULT CURRENT_TIMESTAMP)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO schema_migrations (name) VALUES ('0001_a.sql')")
        .execute(&pool)
        .await
        .unwrap();

    let units = [MigrationUnit::new("0001_a.sql", "CREATE TABLE a (id INTEGER);")];
    assert!(run_migrations(&pool, &units).await.unwrap().is_empty());
    let records = applied_migrations(&pool).await.unwrap();
    assert_eq!(records[0].checksum.as_deref(), Some(units[0].checksum().as_str()));
}

#[tokio::test]
async fn text_employee_ids_become_integers() {
    let dir = tempdir().unwrap();
    let pool = open_sqlite_pool(&dir.path().join("port.sqlite")).await.unwrap();
    let units = util::shipped_migrations();
    run_migrations(&pool, &units[..1]).await.unwrap();

    for (id, name, created_at) in [
        ("7", "Seven", "2024-01-03 00:00:00"),
        ("emp-b", "Bee", "2024-01-02 00:00:00"),
        ("emp-a", "Ay", "2024-01-01 00:00:00"),
    ] {
        sqlx::query(
            "INSERT INTO employees (id, name, employee_type, created_at, updated_at) \
             VALUES (?, ?, '管理', ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(created_at)
        .bind(created_at)
        .execute(&pool)
        .await
        .unwrap();
    }
    sqlx::query(
        "INSERT INTO payroll_inputs (id, employee_id, payroll_month, payload) \
         VALUES ('in-1', 'emp-b', '2024-01', '{}')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let applied = run_migrations(&pool, &units).await.unwrap();
    assert_eq!(applied, vec!["0002_employee_id_integer.sql"]);

    let rows: Vec<(i64, String, String)> =
        sqlx::query_as("SELECT id, name, typeof(id) FROM employees ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            (7, "Seven".to_string(), "integer".to_string()),
            (8, "Ay".to_string(), "integer".to_string()),
            (9, "Bee".to_string(), "integer".to_string()),
        ]
    );
    let employee_id: i64 =
        sqlx::query_scalar("SELECT employee_id FROM payroll_inputs WHERE id = 'in-1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(employee_id, 9);

    let fk_violations = sqlx::query("PRAGMA foreign_key_check")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert!(fk_violations.is_empty());
}
