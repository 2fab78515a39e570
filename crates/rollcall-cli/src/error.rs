use std::io;

use rollcall_core::config::ConfigError;
use rollcall_core::sync::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] rollcall_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Subject ID cannot be empty")]
    EmptySubjectId,
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(String),
    #[error("Invalid time '{0}': expected YYYY-MM-DD, RFC 3339, or Unix milliseconds")]
    InvalidTime(String),
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error("Sync is not configured. Set ROLLCALL_API_URL or pass --api-url.")]
    SyncNotConfigured,
}
