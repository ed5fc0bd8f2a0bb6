use chrono::{SecondsFormat, Utc};

/// UTC timestamp with millisecond precision and a `Z` suffix, e.g.
/// `2026-02-12T00:00:00.000Z`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Calendar date (UTC) used in default backup file names.
pub fn today_ymd() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
