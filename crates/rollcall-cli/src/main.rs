//! Rollcall CLI - record attendance from the terminal
//!
//! Every write lands in the local database first; `sync` and `watch` push
//! it to the remote authority when one is reachable.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands, SubjectCommands, SyncCommands};
use crate::commands::check::{run_amend, run_check};
use crate::commands::common::resolve_db_path;
use crate::commands::list::{run_list, ListOptions};
use crate::commands::status::run_status;
use crate::commands::subject::{run_subject_add, run_subject_list};
use crate::commands::sync::{run_sync, run_sync_conflicts};
use crate::commands::watch::run_watch;
use crate::error::CliError;
use rollcall_core::CheckKind;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "rollcall=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let api_url = cli.api_url.as_deref();

    match cli.command {
        Commands::Subject { command } => match command {
            SubjectCommands::Add {
                subject_id,
                name,
                group,
            } => run_subject_add(&subject_id, &name, &group, &db_path).await?,
            SubjectCommands::List { json } => run_subject_list(json, &db_path).await?,
        },
        Commands::CheckIn { subject_id } => {
            run_check(&subject_id, CheckKind::In, &db_path).await?;
        }
        Commands::CheckOut { subject_id } => {
            run_check(&subject_id, CheckKind::Out, &db_path).await?;
        }
        Commands::Amend { id, kind } => run_amend(&id, kind.into(), &db_path).await?,
        Commands::List {
            subject_id,
            from,
            to,
            page,
            limit,
            json,
        } => {
            let options = ListOptions {
                from: from.as_deref(),
                to: to.as_deref(),
                page,
                limit,
                as_json: json,
            };
            run_list(&subject_id, &options, &db_path).await?;
        }
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::Sync { command, pull } => match command {
            Some(SyncCommands::Conflicts { limit, json }) => {
                run_sync_conflicts(limit, json, &db_path).await?;
            }
            None => run_sync(api_url, pull, &db_path).await?,
        },
        Commands::Watch {
            interval,
            probe_every,
        } => run_watch(api_url, interval, probe_every, &db_path).await?,
    }

    Ok(())
}
