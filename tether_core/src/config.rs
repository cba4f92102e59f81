//! Wire constants for the response stream, overridable by hosts.

use std::env;

use serde::{Deserialize, Serialize};

/// Prefix carried by every payload line of the response stream.
pub const DATA_PREFIX: &str = "data: ";
/// Payload marking the end of a response.
pub const DONE_SENTINEL: &str = "[DONE]";
/// Status markers that flag an error message as authentication related.
pub const AUTH_MARKERS: [&str; 2] = ["401", "403"];

const ENV_DONE_SENTINEL: &str = "TETHER_DONE_SENTINEL";
const ENV_AUTH_MARKERS: &str = "TETHER_AUTH_MARKERS";

/// Settings for decoding one response stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Lines without this prefix are skipped.
    pub data_prefix: String,
    /// Payload that terminates the stream.
    pub done_sentinel: String,
    /// Substrings marking a protocol error as authentication related.
    pub auth_markers: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            data_prefix: DATA_PREFIX.to_owned(),
            done_sentinel: DONE_SENTINEL.to_owned(),
            auth_markers: AUTH_MARKERS.iter().map(|&marker| marker.to_owned()).collect(),
        }
    }
}

impl StreamConfig {
    /// Defaults with `TETHER_DONE_SENTINEL` and `TETHER_AUTH_MARKERS`
    /// (comma-separated) applied when set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(
            env::var(ENV_DONE_SENTINEL).ok(),
            env::var(ENV_AUTH_MARKERS).ok(),
        )
    }

    fn with_overrides(mut self, sentinel: Option<String>, markers: Option<String>) -> Self {
        if let Some(sentinel) = sentinel.filter(|value| !value.trim().is_empty()) {
            self.done_sentinel = sentinel.trim().to_owned();
        }

        if let Some(markers) = markers {
            let parsed: Vec<String> = markers
                .split(',')
                .map(str::trim)
                .filter(|marker| !marker.is_empty())
                .map(str::to_owned)
                .collect();
            if !parsed.is_empty() {
                self.auth_markers = parsed;
            }
        }

        self
    }
}
