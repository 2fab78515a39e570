//! Attendance record store

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{CheckKind, Record, RecordId, Subject, SyncConflict, SyncStatus};

const RECORD_COLUMNS: &str = "id, subject_id, kind, timestamp, sync_status";
const AMEND_ATTEMPTS: usize = 3;

/// Row store the reconciler reads from and writes back to
///
/// Every call is an independent transaction; no cross-row atomicity is
/// promised.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records currently in the given sync state
    async fn get_by_status(&self, status: SyncStatus) -> Result<Vec<Record>>;

    /// Look up a record by ID
    async fn get_by_id(&self, id: &RecordId) -> Result<Option<Record>>;

    /// Insert a new record
    async fn insert(&self, record: &Record) -> Result<RecordId>;

    /// Overwrite every field of an existing record, returning rows affected
    async fn update(&self, record: &Record) -> Result<usize>;

    /// Change only the sync state of a record, returning rows affected
    async fn set_status(&self, id: &RecordId, status: SyncStatus) -> Result<usize>;

    /// Mark a record synced only while it still holds the version stamped
    /// `timestamp`, returning rows affected
    async fn mark_synced(&self, id: &RecordId, timestamp: i64) -> Result<usize>;

    /// Insert or overwrite by ID
    async fn upsert(&self, record: &Record) -> Result<()>;

    /// Persist a resolved conflict for later inspection
    async fn record_conflict(&self, _conflict: &SyncConflict) -> Result<()> {
        Ok(())
    }
}

/// `SQLite` implementation of `RecordStore`, plus the local write path
///
/// The connection lock is taken per statement, so local writes interleave
/// freely with a sync pass that is waiting on the network.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteRecordStore {
    /// Wrap an open database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (and migrate) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory store (primarily for tests)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Register a subject that attendance can be recorded for
    pub async fn add_subject(&self, subject: &Subject) -> Result<()> {
        if subject.subject_id.trim().is_empty() {
            return Err(Error::InvalidInput("Subject ID cannot be empty".into()));
        }
        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO subjects (subject_id, name, group_name, created_at) VALUES (?, ?, ?, ?)",
            params![
                subject.subject_id,
                subject.name,
                subject.group,
                subject.created_at
            ],
        )?;
        Ok(())
    }

    /// Look up a subject
    pub async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>> {
        let db = self.db.lock().await;
        let subject = db
            .connection()
            .query_row(
                "SELECT subject_id, name, group_name, created_at FROM subjects WHERE subject_id = ?",
                params![subject_id],
                parse_subject,
            )
            .optional()?;
        Ok(subject)
    }

    /// All subjects ordered by ID
    pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(
            "SELECT subject_id, name, group_name, created_at FROM subjects ORDER BY subject_id",
        )?;
        let subjects = stmt
            .query_map([], parse_subject)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subjects)
    }

    /// Record a check-in or check-out for a known subject
    ///
    /// The new record is `pending`; it never waits on the network.
    pub async fn record_check(&self, subject_id: &str, kind: CheckKind) -> Result<Record> {
        let subject_id = subject_id.trim();
        if self.get_subject(subject_id).await?.is_none() {
            return Err(Error::NotFound(format!("subject {subject_id}")));
        }

        let record = Record::new(subject_id, kind);
        self.insert(&record).await?;
        tracing::info!(
            subject = subject_id,
            kind = %kind,
            record = %record.id,
            "Recorded attendance"
        );
        Ok(record)
    }

    /// Change the kind of an existing record as a new local edit
    ///
    /// The write only lands on the version that was read; if a sync pass
    /// replaced the row in between, the edit is applied to the new version.
    pub async fn amend_check(&self, id: &RecordId, kind: CheckKind) -> Result<Record> {
        for _ in 0..AMEND_ATTEMPTS {
            let mut record = self
                .get_by_id(id)
                .await?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let read_timestamp = record.timestamp;
            record.amend(kind)?;
            if self.replace_version(&record, read_timestamp).await? == 1 {
                tracing::info!(record = %id, kind = %kind, "Amended attendance record");
                return Ok(record);
            }
            tracing::debug!(record = %id, "Record changed while amending; retrying");
        }
        Err(Error::Database(format!(
            "record {id} kept changing while being amended"
        )))
    }

    /// Overwrite a row only if it is still at `expected_timestamp`
    async fn replace_version(&self, record: &Record, expected_timestamp: i64) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.connection().execute(
            "UPDATE check_records SET subject_id = ?, kind = ?, timestamp = ?, sync_status = ?
             WHERE id = ? AND timestamp = ?",
            params![
                record.subject_id,
                record.kind.as_str(),
                record.timestamp,
                record.sync_status.as_str(),
                record.id.as_str(),
                expected_timestamp
            ],
        )?;
        Ok(rows)
    }

    /// Records for a subject within `[from, to]` (Unix ms), newest first
    pub async fn records_for_subject(
        &self,
        subject_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Record>> {
        if from > to {
            return Err(Error::InvalidInput(format!(
                "range start {from} is after range end {to}"
            )));
        }
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM check_records
             WHERE subject_id = ? AND timestamp BETWEEN ? AND ?
             ORDER BY timestamp DESC"
        ))?;
        let records = stmt
            .query_map(params![subject_id, from, to], parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// One page (1-based) of a subject's records, newest first
    pub async fn records_page(
        &self,
        subject_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Record>> {
        if page == 0 || page_size == 0 {
            return Err(Error::InvalidInput(
                "page and page size must be at least 1".into(),
            ));
        }
        let offset = (page - 1).saturating_mul(page_size);
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM check_records
             WHERE subject_id = ?
             ORDER BY timestamp DESC
             LIMIT ? OFFSET ?"
        ))?;
        let records = stmt
            .query_map(
                params![subject_id, to_sql_int(page_size), to_sql_int(offset)],
                parse_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Number of records in the given sync state
    pub async fn count_by_status(&self, status: SyncStatus) -> Result<usize> {
        let db = self.db.lock().await;
        let count = db.connection().query_row(
            "SELECT COUNT(*) FROM check_records WHERE sync_status = ?",
            params![status.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Most recently resolved conflicts
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(
            "SELECT record_id, local_timestamp, remote_timestamp, resolution, resolved_at
             FROM sync_conflicts
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?",
        )?;
        let conflicts = stmt
            .query_map(params![to_sql_int(limit)], |row| {
                Ok(SyncConflict {
                    record_id: parse_column(row, 0)?,
                    local_timestamp: row.get(1)?,
                    remote_timestamp: row.get(2)?,
                    resolution: parse_column(row, 3)?,
                    resolved_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conflicts)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get_by_status(&self, status: SyncStatus) -> Result<Vec<Record>> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM check_records WHERE sync_status = ? ORDER BY timestamp"
        ))?;
        let records = stmt
            .query_map(params![status.as_str()], parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<Record>> {
        let db = self.db.lock().await;
        let record = db
            .connection()
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM check_records WHERE id = ?"),
                params![id.as_str()],
                parse_record,
            )
            .optional()?;
        Ok(record)
    }

    async fn insert(&self, record: &Record) -> Result<RecordId> {
        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO check_records (id, subject_id, kind, timestamp, sync_status)
             VALUES (?, ?, ?, ?, ?)",
            params![
                record.id.as_str(),
                record.subject_id,
                record.kind.as_str(),
                record.timestamp,
                record.sync_status.as_str()
            ],
        )?;
        Ok(record.id)
    }

    async fn update(&self, record: &Record) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.connection().execute(
            "UPDATE check_records SET subject_id = ?, kind = ?, timestamp = ?, sync_status = ?
             WHERE id = ?",
            params![
                record.subject_id,
                record.kind.as_str(),
                record.timestamp,
                record.sync_status.as_str(),
                record.id.as_str()
            ],
        )?;
        Ok(rows)
    }

    async fn set_status(&self, id: &RecordId, status: SyncStatus) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.connection().execute(
            "UPDATE check_records SET sync_status = ? WHERE id = ?",
            params![status.as_str(), id.as_str()],
        )?;
        Ok(rows)
    }

    async fn mark_synced(&self, id: &RecordId, timestamp: i64) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.connection().execute(
            "UPDATE check_records SET sync_status = ? WHERE id = ? AND timestamp = ?",
            params![SyncStatus::Synced.as_str(), id.as_str(), timestamp],
        )?;
        Ok(rows)
    }

    async fn upsert(&self, record: &Record) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO check_records (id, subject_id, kind, timestamp, sync_status)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                kind = excluded.kind,
                timestamp = excluded.timestamp,
                sync_status = excluded.sync_status",
            params![
                record.id.as_str(),
                record.subject_id,
                record.kind.as_str(),
                record.timestamp,
                record.sync_status.as_str()
            ],
        )?;
        Ok(())
    }

    async fn record_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO sync_conflicts
                (record_id, local_timestamp, remote_timestamp, resolution, resolved_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                conflict.record_id.as_str(),
                conflict.local_timestamp,
                conflict.remote_timestamp,
                conflict.resolution.as_str(),
                conflict.resolved_at
            ],
        )?;
        Ok(())
    }
}

fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: parse_column(row, 0)?,
        subject_id: row.get(1)?,
        kind: parse_column(row, 2)?,
        timestamp: row.get(3)?,
        sync_status: parse_column(row, 4)?,
    })
}

fn parse_subject(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        subject_id: row.get(0)?,
        name: row.get(1)?,
        group: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Read a TEXT column and parse it through `FromStr`
fn parse_column<T>(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(index)?;
    raw.parse().map_err(|error: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, error.to_string().into())
    })
}

fn to_sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConflictResolution;
    use pretty_assertions::assert_eq;

    async fn setup() -> SqliteRecordStore {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .add_subject(&Subject::new("S001", "Ada", "Class A"))
            .await
            .unwrap();
        store
    }

    fn record_at(subject: &str, timestamp: i64, status: SyncStatus) -> Record {
        Record {
            timestamp,
            sync_status: status,
            ..Record::new(subject, CheckKind::In)
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = setup().await;
        let record = record_at("S001", 10, SyncStatus::Pending);

        let id = store.insert(&record).await.unwrap();
        assert_eq!(id, record.id);

        let fetched = store.get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = setup().await;
        assert!(store.get_by_id(&RecordId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_fails() {
        let store = setup().await;
        let record = record_at("S001", 10, SyncStatus::Pending);
        store.insert(&record).await.unwrap();

        assert!(store.insert(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_get_by_status_filters() {
        let store = setup().await;
        let pending = record_at("S001", 10, SyncStatus::Pending);
        let synced = record_at("S001", 20, SyncStatus::Synced);
        store.insert(&pending).await.unwrap();
        store.insert(&synced).await.unwrap();

        let rows = store.get_by_status(SyncStatus::Pending).await.unwrap();
        assert_eq!(rows, vec![pending]);
        assert_eq!(store.count_by_status(SyncStatus::Synced).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_and_set_status_report_affected_rows() {
        let store = setup().await;
        let mut record = record_at("S001", 10, SyncStatus::Pending);
        store.insert(&record).await.unwrap();

        record.kind = CheckKind::Out;
        record.timestamp = 11;
        assert_eq!(store.update(&record).await.unwrap(), 1);
        assert_eq!(
            store.set_status(&record.id, SyncStatus::Synced).await.unwrap(),
            1
        );
        assert_eq!(
            store.set_status(&RecordId::new(), SyncStatus::Synced).await.unwrap(),
            0
        );

        let fetched = store.get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.kind, CheckKind::Out);
        assert_eq!(fetched.timestamp, 11);
        assert_eq!(fetched.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites() {
        let store = setup().await;
        let mut record = record_at("S001", 10, SyncStatus::Synced);
        store.upsert(&record).await.unwrap();

        record.timestamp = 30;
        store.upsert(&record).await.unwrap();

        let fetched = store.get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.timestamp, 30);
    }

    #[tokio::test]
    async fn test_record_check_requires_known_subject() {
        let store = setup().await;

        let record = store.record_check("S001", CheckKind::In).await.unwrap();
        assert_eq!(record.sync_status, SyncStatus::Pending);

        let err = store.record_check("S999", CheckKind::In).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_amend_check_requeues_synced_record() {
        let store = setup().await;
        let record = record_at("S001", 10, SyncStatus::Synced);
        store.insert(&record).await.unwrap();

        let amended = store.amend_check(&record.id, CheckKind::Out).await.unwrap();

        assert_eq!(amended.sync_status, SyncStatus::Pending);
        assert!(amended.timestamp > 10);
        let fetched = store.get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched, amended);
    }

    #[tokio::test]
    async fn test_amend_check_rejects_record_at_end_of_clock() {
        let store = setup().await;
        let record = record_at("S001", i64::MAX, SyncStatus::Synced);
        store.insert(&record).await.unwrap();

        let err = store
            .amend_check(&record.id, CheckKind::Out)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.get_by_id(&record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_replace_version_skips_row_changed_since_read() {
        let store = setup().await;
        let record = record_at("S001", 10, SyncStatus::Synced);
        store.insert(&record).await.unwrap();
        let adopted = Record {
            timestamp: 20,
            ..record.clone()
        };
        store.update(&adopted).await.unwrap();

        let mut edit = record.clone();
        edit.amend(CheckKind::Out).unwrap();

        assert_eq!(store.replace_version(&edit, 10).await.unwrap(), 0);
        assert_eq!(store.get_by_id(&record.id).await.unwrap(), Some(adopted));
        assert_eq!(store.replace_version(&edit, 20).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_synced_requires_pushed_version() {
        let store = setup().await;
        let pushed = record_at("S001", 10, SyncStatus::Pending);
        store.insert(&pushed).await.unwrap();
        let edited = store.amend_check(&pushed.id, CheckKind::Out).await.unwrap();

        assert_eq!(store.mark_synced(&pushed.id, 10).await.unwrap(), 0);
        assert_eq!(
            store.get_by_id(&pushed.id).await.unwrap(),
            Some(edited.clone())
        );

        assert_eq!(store.mark_synced(&pushed.id, edited.timestamp).await.unwrap(), 1);
        let fetched = store.get_by_id(&pushed.id).await.unwrap().unwrap();
        assert_eq!(fetched.sync_status, SyncStatus::Synced);
        assert_eq!(store.mark_synced(&RecordId::new(), 10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_records_for_subject_range() {
        let store = setup().await;
        for ts in [100, 200, 300, 400] {
            store
                .insert(&record_at("S001", ts, SyncStatus::Pending))
                .await
                .unwrap();
        }
        store
            .insert(&record_at("S002", 250, SyncStatus::Pending))
            .await
            .unwrap();

        let rows = store.records_for_subject("S001", 150, 350).await.unwrap();
        let stamps: Vec<i64> = rows.iter().map(|record| record.timestamp).collect();
        assert_eq!(stamps, vec![300, 200]);

        assert!(store.records_for_subject("S001", 10, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_records_page() {
        let store = setup().await;
        for ts in 1..=5 {
            store
                .insert(&record_at("S001", ts, SyncStatus::Pending))
                .await
                .unwrap();
        }

        let first: Vec<i64> = store
            .records_page("S001", 1, 2)
            .await
            .unwrap()
            .iter()
            .map(|record| record.timestamp)
            .collect();
        let last: Vec<i64> = store
            .records_page("S001", 3, 2)
            .await
            .unwrap()
            .iter()
            .map(|record| record.timestamp)
            .collect();

        assert_eq!(first, vec![5, 4]);
        assert_eq!(last, vec![1]);
        assert!(store.records_page("S001", 0, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_conflict_log_round_trip() {
        let store = setup().await;
        let conflict = SyncConflict {
            record_id: RecordId::new(),
            local_timestamp: 30,
            remote_timestamp: 15,
            resolution: ConflictResolution::LocalWins,
            resolved_at: 1_000,
        };

        store.record_conflict(&conflict).await.unwrap();

        assert_eq!(store.list_conflicts(10).await.unwrap(), vec![conflict]);
    }

    #[tokio::test]
    async fn test_subjects() {
        let store = setup().await;
        store
            .add_subject(&Subject::new("S000", "Grace", "Class B"))
            .await
            .unwrap();

        let subjects = store.list_subjects().await.unwrap();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].subject_id, "S000");
        assert_eq!(
            store.get_subject("S001").await.unwrap().unwrap().name,
            "Ada"
        );
        assert!(store
            .add_subject(&Subject::new(" ", "Nobody", "None"))
            .await
            .is_err());
    }
}
