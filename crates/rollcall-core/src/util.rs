//! Small helpers shared by config, transport and the store.

/// Longest remote error body kept in a `TransportError`
const ERROR_EXCERPT_CHARS: usize = 180;

/// Trimmed value, or `None` when absent or blank
pub fn non_empty_trimmed(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(ToString::to_string)
}

pub fn has_http_scheme(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Leading slice of a response body for error messages
pub fn error_excerpt(body: &str) -> String {
    body.trim().chars().take(ERROR_EXCERPT_CHARS).collect()
}

/// Wall-clock time in Unix milliseconds; record timestamps use this scale.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
