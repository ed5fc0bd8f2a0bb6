//! Runtime configuration, resolved once at startup from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const APP_DIR_NAME: &str = "payroll-system";
pub const PROD_DB_FILE: &str = "payroll.sqlite";
pub const LEGACY_STORE_FILE: &str = "payroll-system.json";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AppEnv {
    Prod,
    Test,
}

impl AppEnv {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("test") => AppEnv::Test,
            _ => AppEnv::Prod,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Prod => "prod",
            AppEnv::Test => "test",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReadSource {
    Legacy,
    Relational,
}

impl ReadSource {
    /// `relational` and `sqlite` select the relational store; anything else
    /// reads from the legacy document.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("relational") | Some("sqlite") => ReadSource::Relational,
            _ => ReadSource::Legacy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadSource::Legacy => "legacy",
            ReadSource::Relational => "relational",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum WriteMode {
    Legacy,
    Relational,
    Dual,
}

impl WriteMode {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("relational") | Some("sqlite") => WriteMode::Relational,
            Some("dual") => WriteMode::Dual,
            _ => WriteMode::Legacy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Legacy => "legacy",
            WriteMode::Relational => "relational",
            WriteMode::Dual => "dual",
        }
    }
}

/// Routing for the switching repository. Immutable for the process lifetime.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RepositoryContext {
    pub app_env: AppEnv,
    pub read_source: ReadSource,
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub context: RepositoryContext,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub legacy_store_path: PathBuf,
}

impl RuntimeConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let fallback = match dirs::data_dir() {
            Some(dir) => dir.join(APP_DIR_NAME),
            None => std::env::current_dir()?.join(APP_DIR_NAME),
        };
        Ok(resolve_runtime_config(|key| std::env::var(key).ok(), &fallback))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn temp_test_db_path() -> PathBuf {
    let stamp = crate::time::now_rfc3339().replace(':', "-");
    std::env::temp_dir().join(format!("payroll-test-{}-{}.sqlite", std::process::id(), stamp))
}

/// Resolves configuration from `lookup` (normally the process environment).
/// `default_data_dir` is used when `PAYROLL_DATA_DIR` is unset.
pub fn resolve_runtime_config<F>(lookup: F, default_data_dir: &Path) -> RuntimeConfig
where
    F: Fn(&str) -> Option<String>,
{
    let context = RepositoryContext {
        app_env: AppEnv::parse(lookup("APP_ENV").as_deref()),
        read_source: ReadSource::parse(lookup("READ_SOURCE").as_deref()),
        write_mode: WriteMode::parse(lookup("WRITE_MODE").as_deref()),
    };

    let data_dir = non_blank(lookup("PAYROLL_DATA_DIR"))
        .map(|dir| absolutize(PathBuf::from(dir)))
        .unwrap_or_else(|| default_data_dir.to_path_buf());

    let (db_path, legacy_store_path) = match context.app_env {
        AppEnv::Test => {
            let db_path = non_blank(lookup("TEST_DB_PATH"))
                .map(|path| absolutize(PathBuf::from(path)))
                .unwrap_or_else(temp_test_db_path);
            let mut legacy = db_path.as_os_str().to_os_string();
            legacy.push(".legacy.json");
            (db_path, PathBuf::from(legacy))
        }
        AppEnv::Prod => (data_dir.join(PROD_DB_FILE), data_dir.join(LEGACY_STORE_FILE)),
    };

    RuntimeConfig {
        context,
        data_dir,
        db_path,
        legacy_store_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> RuntimeConfig {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        resolve_runtime_config(|key| env.get(key).cloned(), Path::new("/data/payroll-system"))
    }

    #[test]
    fn defaults_to_prod_legacy() {
        let config = resolve(&[]);
        assert_eq!(config.context.app_env, AppEnv::Prod);
        assert_eq!(config.context.read_source, ReadSource::Legacy);
        assert_eq!(config.context.write_mode, WriteMode::Legacy);
        assert_eq!(config.db_path, PathBuf::from("/data/payroll-system/payroll.sqlite"));
        assert_eq!(
            config.legacy_store_path,
            PathBuf::from("/data/payroll-system/payroll-system.json")
        );
    }

    #[test]
    fn parses_modes_and_aliases() {
        let config = resolve(&[("READ_SOURCE", "sqlite"), ("WRITE_MODE", "DUAL")]);
        assert_eq!(config.context.read_source, ReadSource::Relational);
        assert_eq!(config.context.write_mode, WriteMode::Dual);

        let config = resolve(&[("READ_SOURCE", "relational"), ("WRITE_MODE", "relational")]);
        assert_eq!(config.context.read_source, ReadSource::Relational);
        assert_eq!(config.context.write_mode, WriteMode::Relational);

        let config = resolve(&[("READ_SOURCE", "mongo"), ("WRITE_MODE", "both")]);
        assert_eq!(config.context.read_source, ReadSource::Legacy);
        assert_eq!(config.context.write_mode, WriteMode::Legacy);
    }

    #[test]
    fn test_env_uses_override_path() {
        let config = resolve(&[("APP_ENV", "test"), ("TEST_DB_PATH", "/tmp/x/payroll.test.sqlite")]);
        assert_eq!(config.context.app_env, AppEnv::Test);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x/payroll.test.sqlite"));
        assert_eq!(
            config.legacy_store_path,
            PathBuf::from("/tmp/x/payroll.test.sqlite.legacy.json")
        );
    }

    #[test]
    fn test_env_without_override_uses_unique_temp_file() {
        let config = resolve(&[("APP_ENV", "test"), ("TEST_DB_PATH", "  ")]);
        assert!(config.db_path.starts_with(std::env::temp_dir()));
        let name = config.db_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("payroll-test-{}-", std::process::id())));
        assert!(name.ends_with(".sqlite"));
        assert!(!name.contains(':'));
    }

    #[test]
    fn data_dir_override_applies_in_prod() {
        let config = resolve(&[("PAYROLL_DATA_DIR", "/srv/payroll")]);
        assert_eq!(config.db_path, PathBuf::from("/srv/payroll/payroll.sqlite"));
    }
}
