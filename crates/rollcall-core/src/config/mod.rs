//! Sync configuration.
//!
//! Values come from the process environment (binaries load `.env` first via
//! `dotenvy`). Every variable has a default except the remote base URL,
//! which is only required once a command actually talks to the remote.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::util::{has_http_scheme, non_empty_trimmed};

pub const API_URL_VAR: &str = "ROLLCALL_API_URL";
pub const PUSH_TIMEOUT_VAR: &str = "ROLLCALL_PUSH_TIMEOUT_SECS";
pub const PULL_TIMEOUT_VAR: &str = "ROLLCALL_PULL_TIMEOUT_SECS";
pub const SYNC_INTERVAL_VAR: &str = "ROLLCALL_SYNC_INTERVAL_SECS";
pub const PULL_WHEN_IDLE_VAR: &str = "ROLLCALL_PULL_WHEN_IDLE";

const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PULL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30 * 60;
const MAX_TIMEOUT_SECS: u64 = 300;
const MIN_SYNC_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the reconciler, its transport, and the periodic trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Remote authority base URL, without trailing slash
    pub api_base_url: Option<String>,
    /// Upper bound for one push call
    pub push_timeout: Duration,
    /// Upper bound for one pull call
    pub pull_timeout: Duration,
    /// Period of the background trigger
    pub sync_interval: Duration,
    /// Pull the snapshot even when nothing is pending locally
    pub pull_when_idle: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            push_timeout: Duration::from_secs(DEFAULT_PUSH_TIMEOUT_SECS),
            pull_timeout: Duration::from_secs(DEFAULT_PULL_TIMEOUT_SECS),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            pull_when_idle: false,
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = match non_empty_trimmed(lookup(API_URL_VAR)) {
            Some(url) => Some(normalize_api_base_url(&url)?),
            None => None,
        };

        let push_timeout = parse_secs(
            &lookup,
            PUSH_TIMEOUT_VAR,
            DEFAULT_PUSH_TIMEOUT_SECS,
            1..=MAX_TIMEOUT_SECS,
        )?;
        let pull_timeout = parse_secs(
            &lookup,
            PULL_TIMEOUT_VAR,
            DEFAULT_PULL_TIMEOUT_SECS,
            1..=MAX_TIMEOUT_SECS,
        )?;
        let sync_interval = parse_secs(
            &lookup,
            SYNC_INTERVAL_VAR,
            DEFAULT_SYNC_INTERVAL_SECS,
            MIN_SYNC_INTERVAL_SECS..=u64::MAX,
        )?;

        let pull_when_idle = match non_empty_trimmed(lookup(PULL_WHEN_IDLE_VAR)) {
            None => false,
            Some(value) => parse_flag(&value).ok_or_else(|| {
                ConfigError::Invalid(format!("{PULL_WHEN_IDLE_VAR} must be true or false"))
            })?,
        };

        Ok(Self {
            api_base_url,
            push_timeout,
            pull_timeout,
            sync_interval,
            pull_when_idle,
        })
    }

    /// Override the remote base URL (e.g. from a command-line flag)
    pub fn with_api_base_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.api_base_url = Some(normalize_api_base_url(url)?);
        Ok(self)
    }

    /// The remote base URL, or an error naming the variable to set
    pub fn require_api_base_url(&self) -> Result<&str, ConfigError> {
        self.api_base_url
            .as_deref()
            .ok_or(ConfigError::MissingVar(API_URL_VAR))
    }
}

fn normalize_api_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim();
    if has_http_scheme(url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(ConfigError::Invalid(format!(
            "{API_URL_VAR} must start with http:// or https://"
        )))
    }
}

fn parse_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<Duration, ConfigError> {
    let Some(raw) = non_empty_trimmed(lookup(name)) else {
        return Ok(Duration::from_secs(default));
    };
    let secs = raw
        .parse::<u64>()
        .ok()
        .filter(|secs| range.contains(secs))
        .ok_or_else(|| {
            ConfigError::Invalid(format!(
                "{name} must be an integer in [{}, {}]",
                range.start(),
                range.end()
            ))
        })?;
    Ok(Duration::from_secs(secs))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
