//! One reconciliation pass: push pending records, pull the snapshot, merge.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::SyncSettings;
use crate::db::RecordStore;
use crate::models::{
    ConflictResolution, Record, RecordId, RemoteRecord, SyncConflict, SyncStatus,
};
use crate::util::unix_millis_now;

use super::connectivity::Connectivity;
use super::outcome::{SkipReason, SyncFailure, SyncOutcome, SyncPhase, SyncReport};
use super::policy::{self, MergeAction};
use super::transport::{Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerOptions {
    pub push_timeout: Duration,
    pub pull_timeout: Duration,
    /// Pull and merge even when nothing is pending locally
    pub pull_when_idle: bool,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for ReconcilerOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            push_timeout: settings.push_timeout,
            pull_timeout: settings.pull_timeout,
            pull_when_idle: settings.pull_when_idle,
        }
    }
}

/// Reconciles the local record store with the remote authority
///
/// At most one pass runs at a time; a call that arrives while a pass is in
/// flight returns `SkipReason::AlreadyRunning` immediately.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn Connectivity>,
    options: ReconcilerOptions,
    in_flight: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn Transport>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            store,
            transport,
            connectivity,
            options: ReconcilerOptions::default(),
            in_flight: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn with_options(mut self, options: ReconcilerOptions) -> Self {
        self.options = options;
        self
    }

    pub const fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    /// Run one pass and summarize it. Never returns an error; failures are
    /// captured in the outcome and the next trigger retries.
    pub async fn sync_data(&self) -> SyncOutcome {
        let Ok(_pass) = self.in_flight.try_lock() else {
            tracing::debug!("Sync pass already in flight; dropping trigger");
            return SyncOutcome::Skipped(SkipReason::AlreadyRunning);
        };

        if !self.connectivity.is_online() {
            tracing::info!("No network connection; sync skipped");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        let mut report = SyncReport::default();
        let outcome = match self.run_pass(&mut report).await {
            Ok(Some(reason)) => SyncOutcome::Skipped(reason),
            Ok(None) => SyncOutcome::from_report(report),
            Err(failure) => {
                report.failure = Some(failure);
                SyncOutcome::from_report(report)
            }
        };
        outcome.log();
        outcome
    }

    async fn run_pass(&self, report: &mut SyncReport) -> Result<Option<SkipReason>, SyncFailure> {
        let pending = self
            .store
            .get_by_status(SyncStatus::Pending)
            .await
            .map_err(|error| SyncFailure::new(SyncPhase::Collect, error))?;

        if pending.is_empty() {
            if !self.options.pull_when_idle {
                tracing::info!("No pending records; nothing to sync");
                return Ok(Some(SkipReason::NothingPending));
            }
        } else {
            self.push(&pending, report).await?;
        }

        // Push effects are committed at this point; the pull below sees
        // freshly pushed records as synced.
        self.pull_and_merge(report).await?;
        Ok(None)
    }

    async fn push(&self, pending: &[Record], report: &mut SyncReport) -> Result<(), SyncFailure> {
        let batch: Vec<RemoteRecord> = pending.iter().map(Record::to_remote).collect();
        tracing::debug!(count = batch.len(), "Pushing pending records");

        let ack = with_timeout(self.options.push_timeout, self.transport.push(&batch))
            .await
            .map_err(|error| SyncFailure::new(SyncPhase::Push, error))?;
        if ack.accepted != batch.len() {
            tracing::warn!(
                sent = batch.len(),
                accepted = ack.accepted,
                "Remote acknowledged a different count; treating batch as accepted"
            );
        }

        // Only the version that was sent is acknowledged; a row edited
        // during the push keeps its newer stamp and stays pending.
        for record in pending {
            let acknowledged = self
                .store
                .mark_synced(&record.id, record.timestamp)
                .await
                .map_err(|error| SyncFailure::new(SyncPhase::Acknowledge, error))?;
            if acknowledged == 0 {
                tracing::debug!(
                    record = %record.id,
                    "Record changed while its push was in flight; leaving it pending"
                );
            } else {
                report.counts.pushed += 1;
            }
        }
        Ok(())
    }

    async fn pull_and_merge(&self, report: &mut SyncReport) -> Result<(), SyncFailure> {
        let snapshot = with_timeout(self.options.pull_timeout, self.transport.pull())
            .await
            .map_err(|error| SyncFailure::new(SyncPhase::Pull, error))?;
        tracing::debug!(
            count = snapshot.records.len(),
            malformed = snapshot.malformed,
            "Pulled remote snapshot"
        );
        report.counts.skipped_remote += snapshot.malformed;

        let ambiguous = duplicate_ids(&snapshot.records);
        for remote in &snapshot.records {
            if ambiguous.contains(&remote.id) {
                tracing::warn!(record = %remote.id, "Remote snapshot repeats record id; skipping");
                report.counts.skipped_remote += 1;
                continue;
            }
            if let Err(reason) = remote.validate() {
                tracing::warn!("Skipping invalid remote record: {reason}");
                report.counts.skipped_remote += 1;
                continue;
            }
            self.merge_one(remote, report)
                .await
                .map_err(|error| SyncFailure::new(SyncPhase::Merge, error))?;
        }
        Ok(())
    }

    async fn merge_one(&self, remote: &RemoteRecord, report: &mut SyncReport) -> crate::Result<()> {
        let local = self.store.get_by_id(&remote.id).await?;

        match policy::decide(local.as_ref(), remote) {
            MergeAction::Insert => {
                self.store.insert(&Record::from_remote(remote)).await?;
                report.counts.inserted += 1;
            }
            MergeAction::AdoptRemote {
                discards_local_edit,
            } => {
                let adopted = Record::from_remote(remote);
                if self.store.update(&adopted).await? == 0 {
                    // Row vanished between read and write.
                    self.store.upsert(&adopted).await?;
                }
                report.counts.updated += 1;
                if discards_local_edit {
                    tracing::warn!(
                        record = %remote.id,
                        "Newer remote version replaced an unpushed local edit"
                    );
                    self.log_conflict(local.as_ref(), remote, ConflictResolution::RemoteWins, report)
                        .await?;
                }
            }
            MergeAction::RequeueLocal { already_pending } => {
                if already_pending {
                    report.counts.unchanged += 1;
                } else {
                    self.store
                        .set_status(&remote.id, SyncStatus::Pending)
                        .await?;
                    report.counts.reverted_to_pending += 1;
                    self.log_conflict(local.as_ref(), remote, ConflictResolution::LocalWins, report)
                        .await?;
                }
            }
            MergeAction::Keep => report.counts.unchanged += 1,
        }
        Ok(())
    }

    async fn log_conflict(
        &self,
        local: Option<&Record>,
        remote: &RemoteRecord,
        resolution: ConflictResolution,
        report: &mut SyncReport,
    ) -> crate::Result<()> {
        let Some(local) = local else {
            return Ok(());
        };
        let conflict = SyncConflict {
            record_id: remote.id,
            local_timestamp: local.timestamp,
            remote_timestamp: remote.timestamp,
            resolution,
            resolved_at: unix_millis_now(),
        };
        self.store.record_conflict(&conflict).await?;
        report.counts.conflicts += 1;
        Ok(())
    }
}

/// Bound a transport call; elapsing counts as a transport failure.
async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Transport call exceeded {limit:?}");
            Err(TransportError::Timeout)
        }
    }
}

fn duplicate_ids(records: &[RemoteRecord]) -> HashSet<RecordId> {
    let mut seen: HashMap<RecordId, usize> = HashMap::with_capacity(records.len());
    for record in records {
        *seen.entry(record.id).or_default() += 1;
    }
    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect()
}
