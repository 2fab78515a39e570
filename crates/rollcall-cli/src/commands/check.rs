use std::path::Path;

use rollcall_core::CheckKind;

use crate::commands::common::{normalize_subject_id, open_store, parse_record_id};
use crate::error::CliError;

pub async fn run_check(subject_id: &str, kind: CheckKind, db_path: &Path) -> Result<(), CliError> {
    let subject_id = normalize_subject_id(subject_id)?;
    let store = open_store(db_path)?;
    let record = store.record_check(&subject_id, kind).await?;

    println!("{}", record.id);
    Ok(())
}

pub async fn run_amend(id: &str, kind: CheckKind, db_path: &Path) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let store = open_store(db_path)?;
    let record = store.amend_check(&id, kind).await?;

    println!("{} is now {} (pending sync)", record.id, record.kind);
    Ok(())
}
