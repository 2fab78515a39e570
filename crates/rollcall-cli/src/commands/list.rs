use std::path::Path;

use crate::commands::common::{
    format_record_lines, normalize_subject_id, open_store, parse_time_bound, record_to_list_item,
    RecordListItem,
};
use crate::error::CliError;

pub struct ListOptions<'a> {
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
    pub page: usize,
    pub limit: usize,
    pub as_json: bool,
}

pub async fn run_list(
    subject_id: &str,
    options: &ListOptions<'_>,
    db_path: &Path,
) -> Result<(), CliError> {
    let subject_id = normalize_subject_id(subject_id)?;
    let store = open_store(db_path)?;

    let records = if options.from.is_some() || options.to.is_some() {
        let from = options
            .from
            .map(|raw| parse_time_bound(raw, false))
            .transpose()?
            .unwrap_or(0);
        let to = options
            .to
            .map(|raw| parse_time_bound(raw, true))
            .transpose()?
            .unwrap_or(i64::MAX);
        store.records_for_subject(&subject_id, from, to).await?
    } else {
        store
            .records_page(&subject_id, options.page, options.limit)
            .await?
    };

    if options.as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No records for {subject_id}.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}
