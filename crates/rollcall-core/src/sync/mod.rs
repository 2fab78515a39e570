//! Offline-first reconciliation with a remote authority.

mod connectivity;
mod outcome;
pub mod policy;
mod reconciler;
mod scheduler;
mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use outcome::{
    SkipReason, SyncCounts, SyncError, SyncFailure, SyncOutcome, SyncPhase, SyncReport,
};
pub use policy::MergeAction;
pub use reconciler::{Reconciler, ReconcilerOptions};
pub use scheduler::SyncScheduler;
pub use transport::{
    decode_snapshot, HttpTransport, PushAck, RemoteSnapshot, Transport, TransportError,
};
