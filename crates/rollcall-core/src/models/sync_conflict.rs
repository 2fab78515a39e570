//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::RecordId;

/// Which side a last-writer-wins resolution kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Remote version was newer; a pending local edit was discarded
    RemoteWins,
    /// Local version was newer; it was re-queued for push
    LocalWins,
}

impl ConflictResolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemoteWins => "remote_wins",
            Self::LocalWins => "local_wins",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote_wins" => Ok(Self::RemoteWins),
            "local_wins" => Ok(Self::LocalWins),
            other => Err(format!("unknown conflict resolution '{other}'")),
        }
    }
}

/// Recorded sync conflict resolved by last-writer-wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Record involved in the conflict
    pub record_id: RecordId,
    /// Local timestamp when the conflict was seen
    pub local_timestamp: i64,
    /// Remote timestamp when the conflict was seen
    pub remote_timestamp: i64,
    /// Side that was kept
    pub resolution: ConflictResolution,
    /// Resolution time (Unix ms)
    pub resolved_at: i64,
}
