//! Background triggers for reconciliation passes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::reconciler::Reconciler;

/// Runs a pass on a fixed interval while online and once on every
/// offline-to-online transition
pub struct SyncScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl SyncScheduler {
    pub const fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Start the loop; it exits when `shutdown` flips to `true` or its sender
    /// is dropped.
    pub fn spawn(
        self,
        online: watch::Receiver<bool>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(online, shutdown))
    }

    async fn run(self, mut online: watch::Receiver<bool>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut was_online = *online.borrow_and_update();
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            online = was_online,
            "Sync scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if was_online {
                        self.reconciler.sync_data().await;
                    }
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Connectivity source dropped; stopping scheduler");
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    if now_online && !was_online {
                        tracing::info!("Back online; triggering sync");
                        was_online = true;
                        self.reconciler.sync_data().await;
                    } else if !now_online && was_online {
                        tracing::info!("Offline; sync paused until connectivity returns");
                        was_online = false;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Sync scheduler stopped");
    }
}
