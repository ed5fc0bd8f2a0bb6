use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyhowError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use sqlx::Error as SqlxError;
use std::io::Error as IoError;
use ts_rs::TS;

use crate::backup::file::BackupFileError;
use crate::db::reset::ResetError;
use crate::import::RowError;
use crate::legacy_store::StoreError;
use crate::migrate::MigrationError;
use crate::repo::{DualWriteError, RepositoryError};

/// A structured application error that can be serialized and surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppError {
    /// Machine readable error code.
    pub code: String,
    /// Human friendly message that can be shown directly to the user.
    pub message: String,
    /// Arbitrary key/value pairs that provide additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(optional, as = "Option<HashMap<String, String>>")]
    pub context: HashMap<String, String>,
    /// Optional nested cause that preserves the error chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Code used when an upstream error does not expose a specific code.
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";

    /// Construct a new application error with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    /// Returns the error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the contextual metadata associated with the error.
    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    /// Returns the nested cause if one is present.
    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    /// Adds a contextual key/value pair to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Extends the context map with additional key/value pairs.
    pub fn with_contexts<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.context
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the nested cause for the error.
    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({:?})", self.code, self.message, self.context)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Flattens an anyhow chain into nested causes. An `AppError` found in the
/// chain is kept as is.
impl From<AnyhowError> for AppError {
    fn from(error: AnyhowError) -> Self {
        fn convert(err: &(dyn StdError + 'static)) -> AppError {
            if let Some(app) = err.downcast_ref::<AppError>() {
                return app.clone();
            }

            let mut root = AppError::new(AppError::UNKNOWN_CODE, err.to_string());
            if let Some(source) = err.source() {
                root.cause = Some(Box::new(convert(source)));
            }
            root
        }

        convert(error.as_ref())
    }
}

impl From<IoError> for AppError {
    fn from(error: IoError) -> Self {
        let code = format!("IO/{:?}", error.kind());
        let mut app_error = AppError::new(code, error.to_string());
        if let Some(os_code) = error.raw_os_error() {
            app_error = app_error.with_context("os_code", os_code.to_string());
        }
        app_error
    }
}

impl From<SerdeJsonError> for AppError {
    fn from(error: SerdeJsonError) -> Self {
        let code = if error.is_data() {
            "JSON/DATA"
        } else if error.is_syntax() {
            "JSON/SYNTAX"
        } else if error.is_eof() {
            "JSON/EOF"
        } else if error.is_io() {
            "JSON/IO"
        } else {
            "JSON/ERROR"
        };

        let mut app_error = AppError::new(code, error.to_string());
        let line = error.line();
        if line > 0 {
            app_error = app_error.with_context("line", line.to_string());
        }
        let column = error.column();
        if column > 0 {
            app_error = app_error.with_context("column", column.to_string());
        }
        app_error
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::new("SQLX/ROW_NOT_FOUND", "Record not found"),
            SqlxError::ColumnNotFound(name) => {
                AppError::new("SQLX/COLUMN_NOT_FOUND", format!("Column not found: {name}"))
            }
            SqlxError::PoolTimedOut => AppError::new(
                "SQLX/POOL_TIMEOUT",
                "Timed out acquiring a database connection",
            ),
            SqlxError::PoolClosed => AppError::new("SQLX/POOL_CLOSED", "Database pool is closed"),
            SqlxError::Io(err) => AppError::from(err).with_context("source", "sqlx"),
            SqlxError::Database(db) => {
                let code = db
                    .code()
                    .map(|code| format!("Sqlite/{code}"))
                    .unwrap_or_else(|| "SQLX/DATABASE".to_string());
                let mut app_error = AppError::new(code, db.message().to_string());
                if let Some(constraint) = db.constraint() {
                    app_error = app_error.with_context("constraint", constraint.to_string());
                }
                app_error
            }
            SqlxError::ColumnDecode { index, source } => {
                AppError::new("SQLX/COLUMN_DECODE", source.to_string())
                    .with_context("column_index", index.to_string())
            }
            SqlxError::Decode(decode_err) => AppError::new("SQLX/DECODE", decode_err.to_string()),
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}

impl From<DualWriteError> for AppError {
    fn from(error: DualWriteError) -> Self {
        AppError::new("REPO/DUAL_WRITE", error.to_string()).with_contexts([
            ("mode", error.mode().to_string()),
            ("operation", error.operation),
            ("request_id", error.request_id),
        ])
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::Io { path, source } => AppError::from(source)
                .with_context("path", path.display().to_string())
                .with_context("source", "legacy_store"),
            StoreError::Corrupt { path, .. } => AppError::new("STORE/CORRUPT", message)
                .with_context("path", path.display().to_string()),
            StoreError::Serialize(err) => AppError::from(err),
            StoreError::Closed => AppError::new("STORE/CLOSED", message),
        }
    }
}

impl From<MigrationError> for AppError {
    fn from(error: MigrationError) -> Self {
        let message = error.to_string();
        match error {
            MigrationError::DirNotFound { .. } => AppError::new("MIGRATION/DIR_NOT_FOUND", message),
            MigrationError::Read { path, source } => AppError::new("MIGRATION/FAILED", message)
                .with_context("path", path.display().to_string())
                .with_cause(source),
            MigrationError::ChecksumMismatch { name } => {
                AppError::new("MIGRATION/CHECKSUM_MISMATCH", message).with_context("migration", name)
            }
            MigrationError::Statement {
                name,
                statement,
                source,
            } => AppError::new("MIGRATION/FAILED", message)
                .with_context("migration", name)
                .with_context("statement", statement)
                .with_cause(source),
            MigrationError::Sqlx(source) => {
                AppError::new("MIGRATION/FAILED", message).with_cause(source)
            }
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Sqlx(err) => AppError::from(err),
            RepositoryError::Store(err) => AppError::from(err),
            RepositoryError::Migration(err) => AppError::from(err),
            RepositoryError::Json(err) => AppError::from(err),
            RepositoryError::DualWrite(err) => AppError::from(err),
        }
    }
}

impl From<ResetError> for AppError {
    fn from(error: ResetError) -> Self {
        match error {
            ResetError::NotAllowed => AppError::new("DB/RESET_NOT_ALLOWED", error.to_string())
                .with_context("required", "APP_ENV=test"),
            ResetError::Sqlx(err) => AppError::from(err),
        }
    }
}

impl From<BackupFileError> for AppError {
    fn from(error: BackupFileError) -> Self {
        let message = error.to_string();
        match error {
            BackupFileError::Io { path, source } => {
                AppError::from(source).with_context("path", path.display().to_string())
            }
            BackupFileError::InvalidJson {
                path, line, column, ..
            } => AppError::new("BACKUP/INVALID_JSON", message).with_contexts([
                ("path", path.display().to_string()),
                ("line", line.to_string()),
                ("column", column.to_string()),
            ]),
            BackupFileError::Serialize(err) => AppError::from(err),
        }
    }
}

impl From<RowError> for AppError {
    fn from(error: RowError) -> Self {
        AppError::new("IMPORT/INVALID_ROW", error.to_string())
            .with_context("row", error.row().to_string())
    }
}
