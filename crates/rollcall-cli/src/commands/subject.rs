use std::path::Path;

use rollcall_core::Subject;

use crate::commands::common::{normalize_subject_id, open_store};
use crate::error::CliError;

pub async fn run_subject_add(
    subject_id: &str,
    name: &str,
    group: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let subject_id = normalize_subject_id(subject_id)?;
    let store = open_store(db_path)?;
    store
        .add_subject(&Subject::new(subject_id.as_str(), name.trim(), group.trim()))
        .await?;

    println!("{subject_id}");
    Ok(())
}

pub async fn run_subject_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let subjects = store.list_subjects().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&subjects)?);
        return Ok(());
    }

    if subjects.is_empty() {
        println!("No subjects registered.");
        return Ok(());
    }

    for subject in &subjects {
        println!(
            "{:<12}  {:<24}  {}",
            subject.subject_id, subject.name, subject.group
        );
    }
    Ok(())
}
