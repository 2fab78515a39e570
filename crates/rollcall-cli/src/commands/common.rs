use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::config::SyncSettings;
use rollcall_core::db::SqliteRecordStore;
use rollcall_core::models::SyncConflict;
use rollcall_core::{Record, RecordId};
use serde::Serialize;

use crate::error::CliError;

pub const DB_PATH_VAR: &str = "ROLLCALL_DB_PATH";

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub subject_id: String,
    pub kind: String,
    pub timestamp: i64,
    pub timestamp_iso: String,
    pub sync_status: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub record_id: String,
    pub local_timestamp: i64,
    pub remote_timestamp: i64,
    pub resolution: String,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_VAR).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rollcall")
        .join("rollcall.db")
}

pub fn open_store(path: &Path) -> Result<SqliteRecordStore, CliError> {
    tracing::debug!(path = %path.display(), "Opening record store");
    Ok(SqliteRecordStore::open(path)?)
}

/// Environment settings with the `--api-url` override applied
pub fn resolve_sync_settings(
    api_url: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SyncSettings, CliError> {
    let settings = SyncSettings::from_lookup(lookup)?;
    match api_url {
        Some(url) => Ok(settings.with_api_base_url(url)?),
        None => Ok(settings),
    }
}

pub fn normalize_subject_id(subject_id: &str) -> Result<String, CliError> {
    let trimmed = subject_id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptySubjectId);
    }
    Ok(trimmed.to_string())
}

pub fn parse_record_id(raw: &str) -> Result<RecordId, CliError> {
    RecordId::from_str(raw.trim()).map_err(|_| CliError::InvalidRecordId(raw.trim().to_string()))
}

/// Parse a range bound; a bare date covers the whole UTC day.
pub fn parse_time_bound(raw: &str, end_of_day: bool) -> Result<i64, CliError> {
    let raw = raw.trim();
    if let Ok(date_time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date_time.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_milli_opt(23, 59, 59, 999)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(time) = time {
            return Ok(time.and_utc().timestamp_millis());
        }
    }
    raw.parse::<i64>()
        .ok()
        .filter(|millis| *millis >= 0)
        .ok_or_else(|| CliError::InvalidTime(raw.to_string()))
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let id = record.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            format!(
                "{short_id:<13}  {:<3}  {}  {}",
                record.kind.as_str(),
                format_timestamp(record.timestamp),
                record.sync_status
            )
        })
        .collect()
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    RecordListItem {
        id: record.id.to_string(),
        subject_id: record.subject_id.clone(),
        kind: record.kind.to_string(),
        timestamp: record.timestamp,
        timestamp_iso: format_timestamp(record.timestamp),
        sync_status: record.sync_status.to_string(),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        record_id: conflict.record_id.to_string(),
        local_timestamp: conflict.local_timestamp,
        remote_timestamp: conflict.remote_timestamp,
        resolution: conflict.resolution.to_string(),
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_timestamp(conflict.resolved_at),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<11}  record={}  local={} remote={}",
                format_timestamp(conflict.resolved_at),
                conflict.resolution.as_str(),
                conflict.record_id,
                conflict.local_timestamp,
                conflict.remote_timestamp
            )
        })
        .collect()
}
