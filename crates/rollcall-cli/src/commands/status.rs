use std::path::Path;

use rollcall_core::SyncStatus;
use serde::Serialize;

use crate::commands::common::open_store;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusReport {
    pending: usize,
    synced: usize,
    database: String,
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let report = StatusReport {
        pending: store.count_by_status(SyncStatus::Pending).await?,
        synced: store.count_by_status(SyncStatus::Synced).await?,
        database: db_path.display().to_string(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pending: {}", report.pending);
        println!("Synced:  {}", report.synced);
        println!("Database: {}", report.database);
    }
    Ok(())
}
