//! Subject model

use serde::{Deserialize, Serialize};

use crate::util::unix_millis_now;

/// A person whose attendance is recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// External identifier (e.g. a student number)
    pub subject_id: String,
    /// Display name
    pub name: String,
    /// Class or group the subject belongs to
    pub group: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Subject {
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        name: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            name: name.into(),
            group: group.into(),
            created_at: unix_millis_now(),
        }
    }
}
