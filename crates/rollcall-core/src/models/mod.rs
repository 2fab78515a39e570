//! Data models for Rollcall

mod record;
mod subject;
mod sync_conflict;

pub use record::{CheckKind, Record, RecordId, RemoteRecord, SyncStatus};
pub use subject::Subject;
pub use sync_conflict::{ConflictResolution, SyncConflict};
