//! Result of a reconciliation pass.

use std::fmt;

use thiserror::Error;

use super::transport::TransportError;

/// Failure inside a pass; never fatal to the process
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Storage error: {0}")]
    Storage(#[from] crate::Error),
}

/// Step of the pass a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Reading the pending set
    Collect,
    /// Sending the batch
    Push,
    /// Marking pushed records synced
    Acknowledge,
    /// Fetching the snapshot
    Pull,
    /// Applying the snapshot
    Merge,
}

impl SyncPhase {
    /// Whether local state can have changed before a failure in this phase
    pub const fn may_have_committed(self) -> bool {
        matches!(self, Self::Acknowledge | Self::Pull | Self::Merge)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::Push => "push",
            Self::Acknowledge => "acknowledge",
            Self::Pull => "pull",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct SyncFailure {
    pub phase: SyncPhase,
    pub error: SyncError,
}

impl SyncFailure {
    pub fn new(phase: SyncPhase, error: impl Into<SyncError>) -> Self {
        Self {
            phase,
            error: error.into(),
        }
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.phase, self.error)
    }
}

/// Per-pass counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    /// Records acknowledged by the remote and marked synced
    pub pushed: usize,
    /// Remote records absent locally, inserted
    pub inserted: usize,
    /// Local records overwritten by a newer remote version
    pub updated: usize,
    /// Synced local records found newer than remote, marked pending
    pub reverted_to_pending: usize,
    /// Remote records that needed no write
    pub unchanged: usize,
    /// Remote records skipped as malformed or ambiguous
    pub skipped_remote: usize,
    /// Resolutions written to the conflict log
    pub conflicts: usize,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub counts: SyncCounts,
    pub failure: Option<SyncFailure>,
}

/// Why a pass did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
    NothingPending,
}

/// Structured summary of one `sync_data` call
#[derive(Debug)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    /// Push, pull and merge all finished
    Completed(SyncReport),
    /// Something was committed locally before a failure
    Partial(SyncReport),
    /// Nothing was committed locally
    Failed(SyncReport),
}

impl SyncOutcome {
    pub(crate) fn from_report(report: SyncReport) -> Self {
        let committed = report
            .failure
            .as_ref()
            .map(|failure| failure.phase.may_have_committed());
        match committed {
            None => Self::Completed(report),
            Some(true) => Self::Partial(report),
            Some(false) => Self::Failed(report),
        }
    }

    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Skipped(_) => None,
            Self::Completed(report) | Self::Partial(report) | Self::Failed(report) => Some(report),
        }
    }

    pub fn counts(&self) -> SyncCounts {
        self.report().map(|report| report.counts).unwrap_or_default()
    }

    pub fn failure(&self) -> Option<&SyncFailure> {
        self.report().and_then(|report| report.failure.as_ref())
    }

    /// `true` unless the pass ran and hit an error
    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    pub(crate) fn log(&self) {
        match self {
            Self::Skipped(reason) => tracing::debug!(?reason, "Sync pass skipped"),
            Self::Completed(report) => {
                let counts = report.counts;
                tracing::info!(
                    pushed = counts.pushed,
                    inserted = counts.inserted,
                    updated = counts.updated,
                    reverted = counts.reverted_to_pending,
                    unchanged = counts.unchanged,
                    skipped = counts.skipped_remote,
                    "Sync pass completed"
                );
            }
            Self::Partial(report) => {
                let counts = report.counts;
                tracing::warn!(
                    pushed = counts.pushed,
                    inserted = counts.inserted,
                    updated = counts.updated,
                    reverted = counts.reverted_to_pending,
                    error = %DisplayFailure(report.failure.as_ref()),
                    "Sync pass partially completed"
                );
            }
            Self::Failed(report) => {
                tracing::error!(
                    error = %DisplayFailure(report.failure.as_ref()),
                    "Sync pass failed; local state left untouched"
                );
            }
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.counts();
        match self {
            Self::Skipped(SkipReason::Offline) => f.write_str("skipped: offline"),
            Self::Skipped(SkipReason::AlreadyRunning) => {
                f.write_str("skipped: another sync pass is running")
            }
            Self::Skipped(SkipReason::NothingPending) => f.write_str("skipped: nothing to sync"),
            Self::Completed(_) => write!(
                f,
                "completed: pushed {}, inserted {}, updated {}, re-queued {}, unchanged {}, skipped {}",
                counts.pushed,
                counts.inserted,
                counts.updated,
                counts.reverted_to_pending,
                counts.unchanged,
                counts.skipped_remote
            ),
            Self::Partial(report) => write!(
                f,
                "partial: pushed {}, merged {}; {}",
                counts.pushed,
                counts.inserted + counts.updated + counts.reverted_to_pending,
                DisplayFailure(report.failure.as_ref())
            ),
            Self::Failed(report) => {
                write!(f, "failed: {}", DisplayFailure(report.failure.as_ref()))
            }
        }
    }
}

struct DisplayFailure<'a>(Option<&'a SyncFailure>);

impl fmt::Display for DisplayFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(failure) => fmt::Display::fmt(failure, f),
            None => f.write_str("unknown error"),
        }
    }
}
