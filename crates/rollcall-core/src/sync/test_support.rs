//! In-memory fakes for exercising the reconciler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::db::{RecordStore, SqliteRecordStore};
use crate::error::{Error, Result};
use crate::models::{
    CheckKind, Record, RecordId, RemoteRecord, Subject, SyncConflict, SyncStatus,
};

use super::transport::{PushAck, RemoteSnapshot, Transport, TransportError};

/// Remote authority kept in memory
///
/// Accepted pushes are merged into the snapshot by timestamp, so a later
/// pull echoes them back the way a real server would.
#[derive(Default)]
pub(crate) struct FakeTransport {
    snapshot: Mutex<Vec<RemoteRecord>>,
    malformed: AtomicUsize,
    batches: Mutex<Vec<Vec<RemoteRecord>>>,
    pub push_calls: AtomicUsize,
    pub pull_calls: AtomicUsize,
    pub fail_push: AtomicBool,
    pub fail_pull: AtomicBool,
    pub reject_push: AtomicBool,
    push_delay: Mutex<Option<Duration>>,
    /// Signalled once per push, before any delay
    pub push_started: Notify,
}

impl FakeTransport {
    pub fn with_snapshot(records: Vec<RemoteRecord>) -> Self {
        let transport = Self::default();
        transport.set_snapshot(records);
        transport
    }

    pub fn set_snapshot(&self, records: Vec<RemoteRecord>) {
        *self.snapshot.lock().unwrap() = records;
    }

    pub fn set_malformed(&self, count: usize) {
        self.malformed.store(count, Ordering::SeqCst);
    }

    pub fn set_push_delay(&self, delay: Duration) {
        *self.push_delay.lock().unwrap() = Some(delay);
    }

    pub fn pushed_batches(&self) -> Vec<Vec<RemoteRecord>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn push_count(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn pull_count(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    fn accept(&self, batch: &[RemoteRecord]) {
        let mut snapshot = self.snapshot.lock().unwrap();
        for incoming in batch {
            match snapshot.iter_mut().find(|existing| existing.id == incoming.id) {
                Some(existing) if incoming.timestamp >= existing.timestamp => {
                    *existing = incoming.clone();
                }
                Some(_) => {}
                None => snapshot.push(incoming.clone()),
            }
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn push(&self, batch: &[RemoteRecord]) -> std::result::Result<PushAck, TransportError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.push_started.notify_one();

        let delay = *self.push_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(TransportError::Network("connection reset".to_string()));
        }
        if self.reject_push.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("quota exceeded".to_string()));
        }

        self.accept(batch);
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(PushAck {
            accepted: batch.len(),
            message: None,
        })
    }

    async fn pull(&self) -> std::result::Result<RemoteSnapshot, TransportError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(RemoteSnapshot {
            records: self.snapshot.lock().unwrap().clone(),
            malformed: self.malformed.load(Ordering::SeqCst),
        })
    }
}

/// Store whose every call fails
pub(crate) struct BrokenStore;

#[async_trait]
impl RecordStore for BrokenStore {
    async fn get_by_status(&self, _status: SyncStatus) -> Result<Vec<Record>> {
        Err(Error::Database("disk I/O error".to_string()))
    }

    async fn get_by_id(&self, _id: &RecordId) -> Result<Option<Record>> {
        Err(Error::Database("disk I/O error".to_string()))
    }

    async fn insert(&self, _record: &Record) -> Result<RecordId> {
        Err(Error::Database("disk I/O error".to_string()))
    }

    async fn update(&self, _record: &Record) -> Result<usize> {
        Err(Error::Database("disk I/O error".to_string()))
    }

    async fn set_status(&self, _id: &RecordId, _status: SyncStatus) -> Result<usize> {
        Err(Error::Database("disk I/O error".to_string()))
    }

    async fn mark_synced(&self, _id: &RecordId, _timestamp: i64) -> Result<usize> {
        Err(Error::Database("disk I/O error".to_string()))
    }

    async fn upsert(&self, _record: &Record) -> Result<()> {
        Err(Error::Database("disk I/O error".to_string()))
    }

    async fn record_conflict(&self, _conflict: &SyncConflict) -> Result<()> {
        Err(Error::Database("disk I/O error".to_string()))
    }
}

pub(crate) async fn memory_store() -> SqliteRecordStore {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    store
        .add_subject(&Subject::new("S001", "Ada Lovelace", "Class A"))
        .await
        .unwrap();
    store
}

pub(crate) fn record_at(timestamp: i64, sync_status: SyncStatus) -> Record {
    Record {
        timestamp,
        sync_status,
        ..Record::new("S001", CheckKind::In)
    }
}

pub(crate) async fn seed(store: &SqliteRecordStore, records: &[Record]) {
    for record in records {
        store.insert(record).await.unwrap();
    }
}

/// Every row keyed by ID, for before/after comparisons
pub(crate) async fn dump(store: &SqliteRecordStore) -> HashMap<RecordId, Record> {
    let mut rows = store.get_by_status(SyncStatus::Pending).await.unwrap();
    rows.extend(store.get_by_status(SyncStatus::Synced).await.unwrap());
    rows.into_iter().map(|record| (record.id, record)).collect()
}
