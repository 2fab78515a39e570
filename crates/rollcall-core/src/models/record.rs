//! Attendance record model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::util::unix_millis_now;

/// A unique identifier for a record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Direction of an attendance event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    In,
    Out,
}

impl CheckKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "check-in" => Ok(Self::In),
            "out" | "check-out" => Ok(Self::Out),
            other => Err(format!("unknown check kind '{other}'")),
        }
    }
}

/// Whether the local copy of a record has been confirmed by the remote authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Locally created or modified, not yet acknowledged
    Pending,
    /// Matches the remote authority as of the last reconciliation
    Synced,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            other => Err(format!("unknown sync status '{other}'")),
        }
    }
}

/// An attendance record as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier
    pub id: RecordId,
    /// Subject the event is about
    pub subject_id: String,
    /// Check-in or check-out
    pub kind: CheckKind,
    /// When the event happened (Unix ms); also the last-writer-wins clock
    pub timestamp: i64,
    /// Local sync state
    pub sync_status: SyncStatus,
}

impl Record {
    /// Create a new pending record stamped with the current time
    #[must_use]
    pub fn new(subject_id: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            id: RecordId::new(),
            subject_id: subject_id.into(),
            kind,
            timestamp: unix_millis_now(),
            sync_status: SyncStatus::Pending,
        }
    }

    /// Apply a local edit: new kind, fresh timestamp, back to pending
    ///
    /// The new timestamp is strictly greater than the old one, so the edit
    /// wins the next merge. Fails, leaving the record untouched, when the
    /// timestamp is already at the end of the range.
    pub fn amend(&mut self, kind: CheckKind) -> crate::Result<()> {
        let next = self.timestamp.checked_add(1).ok_or_else(|| {
            Error::InvalidInput(format!(
                "record {} has timestamp {} and cannot be amended",
                self.id, self.timestamp
            ))
        })?;
        self.kind = kind;
        self.timestamp = unix_millis_now().max(next);
        self.sync_status = SyncStatus::Pending;
        Ok(())
    }

    /// Adopt a remote version verbatim; the result is synced.
    #[must_use]
    pub fn from_remote(remote: &RemoteRecord) -> Self {
        Self {
            id: remote.id,
            subject_id: remote.subject_id.clone(),
            kind: remote.kind,
            timestamp: remote.timestamp,
            sync_status: SyncStatus::Synced,
        }
    }

    /// Wire form sent to the remote authority
    #[must_use]
    pub fn to_remote(&self) -> RemoteRecord {
        RemoteRecord {
            id: self.id,
            subject_id: self.subject_id.clone(),
            kind: self.kind,
            timestamp: self.timestamp,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Pending
    }
}

/// A record as exchanged with the remote authority
///
/// `timestamp` is serialized as Unix milliseconds and accepts either an
/// integer or an RFC 3339 string on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RecordId,
    pub subject_id: String,
    pub kind: CheckKind,
    #[serde(alias = "updated_at", deserialize_with = "timestamp_millis::deserialize")]
    pub timestamp: i64,
}

impl RemoteRecord {
    /// Reject records the local store cannot hold.
    pub fn validate(&self) -> Result<(), String> {
        if self.subject_id.trim().is_empty() {
            return Err(format!("record {} has an empty subject_id", self.id));
        }
        if self.timestamp < 0 {
            return Err(format!(
                "record {} has a negative timestamp {}",
                self.id, self.timestamp
            ));
        }
        Ok(())
    }
}

mod timestamp_millis {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Millis(millis) => Ok(millis),
            RawTimestamp::Text(text) => {
                let text = text.trim();
                if let Ok(millis) = text.parse::<i64>() {
                    return Ok(millis);
                }
                chrono::DateTime::parse_from_rfc3339(text)
                    .map(|parsed| parsed.timestamp_millis())
                    .map_err(|error| de::Error::custom(format!("invalid timestamp '{text}': {error}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_id_unique() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn test_record_id_parse() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_record_new_is_pending() {
        let record = Record::new("S001", CheckKind::In);
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert!(record.timestamp > 0);
    }

    #[test]
    fn test_amend_moves_clock_forward_and_requeues() {
        let mut record = Record::new("S001", CheckKind::In);
        record.sync_status = SyncStatus::Synced;
        record.timestamp = i64::MAX / 2;
        let before = record.timestamp;

        record.amend(CheckKind::Out).unwrap();

        assert_eq!(record.kind, CheckKind::Out);
        assert!(record.timestamp > before);
        assert!(record.is_pending());
    }

    #[test]
    fn test_amend_refuses_record_at_end_of_clock() {
        let mut record = Record::new("S001", CheckKind::In);
        record.sync_status = SyncStatus::Synced;
        record.timestamp = i64::MAX;
        let before = record.clone();

        let err = record.amend(CheckKind::Out).unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(record, before);

        record.timestamp = i64::MAX - 1;
        record.amend(CheckKind::Out).unwrap();
        assert_eq!(record.timestamp, i64::MAX);
        assert!(record.is_pending());
    }

    #[test]
    fn test_check_kind_parse() {
        assert_eq!("IN".parse::<CheckKind>().unwrap(), CheckKind::In);
        assert_eq!("check-out".parse::<CheckKind>().unwrap(), CheckKind::Out);
        assert!("sideways".parse::<CheckKind>().is_err());
    }

    #[test]
    fn test_remote_timestamp_accepts_rfc3339() {
        let json = r#"{
            "id": "01890a5d-ac96-774b-bcce-b302099a8057",
            "subject_id": "S001",
            "kind": "in",
            "timestamp": "1970-01-01T00:00:01.500Z"
        }"#;
        let remote: RemoteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(remote.timestamp, 1_500);
    }

    #[test]
    fn test_remote_timestamp_accepts_integer_and_alias() {
        let json = r#"{
            "id": "01890a5d-ac96-774b-bcce-b302099a8057",
            "subject_id": "S001",
            "kind": "out",
            "updated_at": 42
        }"#;
        let remote: RemoteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(remote.timestamp, 42);
        assert_eq!(remote.kind, CheckKind::Out);
    }

    #[test]
    fn test_remote_validate_rejects_blank_subject() {
        let mut remote = Record::new("S001", CheckKind::In).to_remote();
        assert!(remote.validate().is_ok());
        remote.subject_id = "  ".to_string();
        assert!(remote.validate().is_err());
    }

    #[test]
    fn test_from_remote_is_synced() {
        let remote = Record::new("S001", CheckKind::In).to_remote();
        let local = Record::from_remote(&remote);
        assert_eq!(local.sync_status, SyncStatus::Synced);
        assert_eq!(local.to_remote(), remote);
    }
}
