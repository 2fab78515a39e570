//! Online/offline signal.

use std::sync::Arc;

use tokio::sync::watch;

/// Readable "are we online" flag, checked at the start of every pass
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

impl<F> Connectivity for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_online(&self) -> bool {
        self()
    }
}

/// Shared online flag that also notifies subscribers on change
#[derive(Clone, Debug)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self {
            state: Arc::new(state),
        }
    }

    /// Record the latest signal; returns `true` when it changed
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                tracing::info!("Network connection restored");
            } else {
                tracing::info!("Network connection lost; working offline");
            }
        }
        changed
    }

    /// Receiver that wakes on every change
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Connectivity for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }
}
