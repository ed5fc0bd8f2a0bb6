use futures::FutureExt;
use serde_json::Value;
use sqlx::SqlitePool;

use super::{ensure_companies, parse_json_record, upsert_setting};
use crate::db::run_in_tx;
use crate::defaults::{normalize_settings_input, normalize_social_config, DEFAULT_ORG_NAME};
use crate::model::{Company, OrganizationSettings, SocialConfig};
use crate::repo::{RepoResult, RepositoryError};

pub(super) const ORG_NAME_KEY: &str = "orgName";
pub(super) const SOCIAL_KEY: &str = "social";

async fn read_setting(pool: &SqlitePool, key: &str) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub(super) async fn read_settings(pool: &SqlitePool) -> sqlx::Result<OrganizationSettings> {
    let org_name = read_setting(pool, ORG_NAME_KEY)
        .await?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_ORG_NAME.to_string());

    let social = match read_setting(pool, SOCIAL_KEY).await? {
        Some(raw) => normalize_social_config(Some(&Value::Object(parse_json_record(&raw)))),
        None => SocialConfig::default(),
    };

    let companies: Vec<(String, String)> =
        sqlx::query_as("SELECT short, full FROM companies ORDER BY short COLLATE NOCASE ASC")
            .fetch_all(pool)
            .await?;

    Ok(OrganizationSettings {
        org_name,
        social,
        companies: companies
            .into_iter()
            .map(|(short, full)| Company { short, full })
            .collect(),
    })
}

/// Upserts both settings keys and the company list in one transaction.
/// Companies absent from `settings` are left in place.
pub(super) async fn write_settings(
    pool: &SqlitePool,
    settings: OrganizationSettings,
) -> RepoResult<()> {
    let settings = normalize_settings_input(&settings)?;
    let social = serde_json::to_string(&settings.social)?;

    run_in_tx(pool, move |conn| {
        async move {
            upsert_setting(&mut *conn, ORG_NAME_KEY, &settings.org_name).await?;
            upsert_setting(&mut *conn, SOCIAL_KEY, &social).await?;
            ensure_companies(&mut *conn, &settings.companies).await?;
            Ok::<_, RepositoryError>(())
        }
        .boxed()
    })
    .await
}
