use std::collections::HashMap;
use std::env;

use thiserror::Error;

pub const BIND_ADDR_VAR: &str = "ROLLCALL_SERVER_BIND_ADDR";
pub const MAX_BATCH_VAR: &str = "ROLLCALL_SERVER_MAX_BATCH";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_BATCH: usize = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Largest push batch accepted in one request
    pub max_batch: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = optional_trimmed(&lookup, BIND_ADDR_VAR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let max_batch = match optional_trimmed(&lookup, MAX_BATCH_VAR) {
            None => DEFAULT_MAX_BATCH,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!("{MAX_BATCH_VAR} must be a positive integer"))
                })?,
        };

        Ok(Self {
            bind_addr,
            max_batch,
        })
    }
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
