//! Last-writer-wins merge policy.
//!
//! Compares one remote record with the local copy that has the same ID and
//! decides what the local store should do. The timestamp is the only
//! ordering signal; equal timestamps are treated as the same version so
//! repeated passes never flap.

use std::cmp::Ordering;

use crate::models::{Record, RemoteRecord};

/// What to do with the local store for one remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// No local copy: insert the remote record as synced
    Insert,
    /// Remote is newer: overwrite local fields and mark synced
    AdoptRemote {
        /// The local copy was pending, so its unpushed edit is lost
        discards_local_edit: bool,
    },
    /// Local is newer: keep fields and mark pending so it is pushed again
    RequeueLocal {
        /// Nothing to write, the record is already pending
        already_pending: bool,
    },
    /// Same timestamp: leave the row untouched
    Keep,
}

/// Decide how to merge `remote` into the store given the current `local` copy
pub fn decide(local: Option<&Record>, remote: &RemoteRecord) -> MergeAction {
    let Some(local) = local else {
        return MergeAction::Insert;
    };

    match remote.timestamp.cmp(&local.timestamp) {
        Ordering::Greater => MergeAction::AdoptRemote {
            discards_local_edit: local.is_pending(),
        },
        Ordering::Less => MergeAction::RequeueLocal {
            already_pending: local.is_pending(),
        },
        Ordering::Equal => MergeAction::Keep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckKind, SyncStatus};

    fn local(timestamp: i64, sync_status: SyncStatus) -> Record {
        Record {
            timestamp,
            sync_status,
            ..Record::new("S001", CheckKind::In)
        }
    }

    fn remote_of(record: &Record, timestamp: i64) -> RemoteRecord {
        RemoteRecord {
            timestamp,
            ..record.to_remote()
        }
    }

    #[test]
    fn missing_local_inserts() {
        let remote = local(10, SyncStatus::Synced).to_remote();
        assert_eq!(decide(None, &remote), MergeAction::Insert);
    }

    #[test]
    fn newer_remote_is_adopted() {
        let record = local(10, SyncStatus::Synced);
        assert_eq!(
            decide(Some(&record), &remote_of(&record, 20)),
            MergeAction::AdoptRemote {
                discards_local_edit: false
            }
        );
    }

    #[test]
    fn newer_remote_over_pending_local_discards_the_edit() {
        // Accepted last-writer-wins limitation: the unpushed local edit loses.
        let record = local(10, SyncStatus::Pending);
        assert_eq!(
            decide(Some(&record), &remote_of(&record, 20)),
            MergeAction::AdoptRemote {
                discards_local_edit: true
            }
        );
    }

    #[test]
    fn older_remote_requeues_local() {
        let record = local(30, SyncStatus::Synced);
        assert_eq!(
            decide(Some(&record), &remote_of(&record, 15)),
            MergeAction::RequeueLocal {
                already_pending: false
            }
        );

        let pending = local(30, SyncStatus::Pending);
        assert_eq!(
            decide(Some(&pending), &remote_of(&pending, 15)),
            MergeAction::RequeueLocal {
                already_pending: true
            }
        );
    }

    #[test]
    fn equal_timestamps_keep_local_even_if_fields_differ() {
        let record = local(40, SyncStatus::Synced);
        let remote = RemoteRecord {
            kind: CheckKind::Out,
            ..remote_of(&record, 40)
        };
        assert_eq!(decide(Some(&record), &remote), MergeAction::Keep);
    }
}
