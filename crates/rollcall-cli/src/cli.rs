use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rollcall_core::CheckKind;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Record attendance offline and sync it when a connection is available")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Remote base URL (overrides ROLLCALL_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage subjects
    Subject {
        #[command(subcommand)]
        command: SubjectCommands,
    },
    /// Record a check-in
    #[command(name = "check-in", alias = "in")]
    CheckIn {
        /// Subject ID
        subject_id: String,
    },
    /// Record a check-out
    #[command(name = "check-out", alias = "out")]
    CheckOut {
        /// Subject ID
        subject_id: String,
    },
    /// Correct the kind of an existing record
    Amend {
        /// Record ID
        id: String,
        /// New kind
        #[arg(value_enum)]
        kind: KindArg,
    },
    /// List a subject's records, newest first
    List {
        /// Subject ID
        subject_id: String,
        /// Range start (YYYY-MM-DD, RFC 3339, or Unix ms)
        #[arg(long)]
        from: Option<String>,
        /// Range end (YYYY-MM-DD, RFC 3339, or Unix ms)
        #[arg(long)]
        to: Option<String>,
        /// Page number when no range is given
        #[arg(long, default_value = "1")]
        page: usize,
        /// Records per page
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how many records are waiting to sync
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync pass with the remote
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
        /// Pull the remote snapshot even when nothing is pending
        #[arg(long)]
        pull: bool,
    },
    /// Keep syncing in the background until interrupted
    Watch {
        /// Seconds between scheduled passes (overrides ROLLCALL_SYNC_INTERVAL_SECS)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
        /// Seconds between connectivity probes
        #[arg(long, value_name = "SECS", default_value = "30")]
        probe_every: u64,
    },
}

#[derive(Subcommand)]
pub enum SubjectCommands {
    /// Register a subject
    Add {
        /// Subject ID (e.g. student number)
        subject_id: String,
        /// Display name
        name: String,
        /// Class or group
        #[arg(long, default_value = "")]
        group: String,
    },
    /// List registered subjects
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    In,
    Out,
}

impl From<KindArg> for CheckKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::In => Self::In,
            KindArg::Out => Self::Out,
        }
    }
}
