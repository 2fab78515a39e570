//! rollcall-core - Core library for Rollcall
//!
//! Attendance records, the local `SQLite` store, and the reconciler that keeps
//! the store in step with a remote authority while working offline-first.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{CheckKind, Record, RecordId, RemoteRecord, Subject, SyncStatus};
