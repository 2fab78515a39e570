use std::env;
use std::path::Path;
use std::sync::Arc;

use rollcall_core::config::SyncSettings;
use rollcall_core::sync::{ConnectivityMonitor, HttpTransport, Reconciler, ReconcilerOptions};

use crate::commands::common::{
    format_sync_conflict_lines, open_store, resolve_sync_settings, sync_conflict_to_item,
    SyncConflictItem,
};
use crate::error::CliError;

/// Everything a sync command needs, wired together
pub struct SyncContext {
    pub settings: SyncSettings,
    pub transport: Arc<HttpTransport>,
    pub monitor: ConnectivityMonitor,
    pub reconciler: Arc<Reconciler>,
}

pub async fn build_sync_context(
    api_url: Option<&str>,
    force_pull: bool,
    db_path: &Path,
) -> Result<SyncContext, CliError> {
    let settings = resolve_sync_settings(api_url, |name| env::var(name).ok())?;
    let base_url = settings
        .require_api_base_url()
        .map_err(|_| CliError::SyncNotConfigured)?;
    let transport = Arc::new(HttpTransport::new(base_url)?);
    let store = open_store(db_path)?;

    let online = transport.probe().await;
    tracing::debug!(url = transport.base_url(), online, "Probed remote");
    let monitor = ConnectivityMonitor::new(online);

    let mut options = ReconcilerOptions::from(&settings);
    options.pull_when_idle |= force_pull;
    let reconciler = Reconciler::new(
        Arc::new(store),
        transport.clone(),
        Arc::new(monitor.clone()),
    )
    .with_options(options);

    Ok(SyncContext {
        settings,
        transport,
        monitor,
        reconciler: Arc::new(reconciler),
    })
}

pub async fn run_sync(
    api_url: Option<&str>,
    force_pull: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let context = build_sync_context(api_url, force_pull, db_path).await?;
    let outcome = context.reconciler.sync_data().await;

    if !outcome.is_success() {
        return Err(CliError::SyncFailed(outcome.to_string()));
    }
    println!("Sync {outcome}");
    Ok(())
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let conflicts = store.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
