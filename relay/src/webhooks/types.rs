//! Webhook Types
//!
//! Target descriptors as the host provides them, their resolved form, and
//! delivery results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Method used when a target does not set one.
pub const DEFAULT_METHOD: &str = "POST";

/// Body template used when a target does not set one.
pub const DEFAULT_BODY: &str = "{\"msg\":\"$title\n$message\"}";

/// Header set used when a target sets none.
pub const DEFAULT_HEADERS: [(&str, &str); 1] = [("Content-Type", "application/json")];

/// Webhook target as written in the host configuration.
///
/// Every field but `url` is optional; see [`TargetConfig::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, alias = "header", skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl TargetConfig {
    /// Create a target config with only a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Fill in defaults for every empty field.
    ///
    /// Empty strings count as unset, and so does an empty header map.
    pub fn resolve(self) -> Target {
        let method = self
            .method
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_METHOD.to_string());

        let body = self
            .body
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BODY.to_string());

        let headers = self
            .headers
            .filter(|h| !h.is_empty())
            .unwrap_or_else(default_headers);

        Target {
            url: self.url,
            method,
            body,
            headers,
        }
    }
}

/// A fully populated webhook target. Dispatch only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub url: String,
    pub method: String,
    /// Body template; `$title` and `$message` are substituted per event.
    pub body: String,
    /// Header templates, rendered the same way as the body.
    pub headers: BTreeMap<String, String>,
}

fn default_headers() -> BTreeMap<String, String> {
    DEFAULT_HEADERS
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// How a single event is fanned out across targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One request at a time, in target order.
    #[default]
    Sequential,
    /// All requests in flight at once; results keep target order.
    Concurrent,
}

impl DispatchMode {
    /// Parse from a config string (`"sequential"` or `"concurrent"`).
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "concurrent" => Some(Self::Concurrent),
            _ => None,
        }
    }
}

/// Result of one delivery attempt to one target.
#[derive(Debug)]
pub struct DeliveryOutcome {
    /// Position of the target in the configured list.
    pub index: usize,
    pub url: String,
    /// Response status on transport success.
    pub result: Result<u16, DispatchError>,
}

impl DeliveryOutcome {
    /// Whether the request reached the target, whatever the status.
    pub const fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }

    /// Response status, if a response was received.
    pub fn status(&self) -> Option<u16> {
        self.result.as_ref().ok().copied()
    }
}

/// Errors local to one target's delivery attempt.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}
