use std::path::Path;
use std::time::Duration;

use rollcall_core::sync::{Connectivity, SyncScheduler};
use tokio::sync::watch;

use crate::commands::sync::build_sync_context;
use crate::error::CliError;

pub async fn run_watch(
    api_url: Option<&str>,
    interval: Option<u64>,
    probe_every: u64,
    db_path: &Path,
) -> Result<(), CliError> {
    let context = build_sync_context(api_url, false, db_path).await?;
    let interval = interval.map_or(context.settings.sync_interval, Duration::from_secs);

    if context.monitor.is_online() {
        let outcome = context.reconciler.sync_data().await;
        println!("Sync {outcome}");
    } else {
        println!("Remote unreachable; working offline");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = SyncScheduler::new(context.reconciler.clone(), interval)
        .spawn(context.monitor.subscribe(), shutdown_rx);

    let mut probe = tokio::time::interval(Duration::from_secs(probe_every.max(1)));
    probe.tick().await;
    println!(
        "Watching {} (sync every {}s); press Ctrl-C to stop",
        context.transport.base_url(),
        interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = probe.tick() => {
                context.monitor.set_online(context.transport.probe().await);
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    shutdown_tx.send(true).ok();
    if let Err(error) = scheduler.await {
        tracing::warn!("Sync scheduler ended abnormally: {error}");
    }
    Ok(())
}
