//! Relay Configuration
//!
//! Host-facing configuration, its resolved immutable form, and loading from
//! environment variables.

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stream::SessionError;
use crate::webhooks::{DispatchMode, Target, TargetConfig};

/// Server address used when none is configured.
pub const DEFAULT_SERVER_ADDRESS: &str = "ws://localhost";

/// Configuration as provided by the host.
///
/// Legacy snake_case keys (`client_token`, `host_server`, `web_hooks`)
/// are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Client token used to authenticate the stream.
    #[serde(default, alias = "client_token")]
    pub token: String,

    /// Stream-capable server URL (e.g., "ws://localhost")
    #[serde(
        default = "default_server_address",
        alias = "server_address",
        alias = "host_server"
    )]
    pub server_address: String,

    /// Webhook targets, in delivery order.
    #[serde(default, alias = "web_hooks")]
    pub targets: Vec<TargetConfig>,

    /// Whether targets are called one after another or all at once.
    #[serde(default, alias = "dispatch_mode")]
    pub dispatch_mode: DispatchMode,

    /// Per-request webhook timeout in seconds (unbounded when unset).
    #[serde(
        default,
        alias = "webhook_timeout_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub webhook_timeout_secs: Option<u64>,
}

fn default_server_address() -> String {
    DEFAULT_SERVER_ADDRESS.to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            server_address: default_server_address(),
            targets: Vec::new(),
            dispatch_mode: DispatchMode::default(),
            webhook_timeout_secs: None,
        }
    }
}

impl HostConfig {
    /// Load configuration from environment variables.
    ///
    /// `RELAY_CONFIG_FILE` points at a YAML document holding the whole
    /// configuration. Otherwise `RELAY_TARGETS_FILE` may point at a YAML list
    /// of targets. `RELAY_TOKEN`, `RELAY_SERVER_ADDRESS`,
    /// `RELAY_DISPATCH_MODE` and `RELAY_WEBHOOK_TIMEOUT_SECS` override
    /// whatever the files set.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("RELAY_CONFIG_FILE") {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(path) = env::var("RELAY_TARGETS_FILE") {
            config.targets = load_targets_file(&path)?;
        }
        if let Ok(token) = env::var("RELAY_TOKEN") {
            config.token = token;
        }
        if let Ok(address) = env::var("RELAY_SERVER_ADDRESS") {
            config.server_address = address;
        }
        if let Ok(mode) = env::var("RELAY_DISPATCH_MODE") {
            config.dispatch_mode = DispatchMode::parse_str(&mode)
                .with_context(|| format!("RELAY_DISPATCH_MODE has unknown value {mode:?}"))?;
        }
        if let Ok(secs) = env::var("RELAY_WEBHOOK_TIMEOUT_SECS") {
            config.webhook_timeout_secs = Some(
                secs.parse()
                    .context("RELAY_WEBHOOK_TIMEOUT_SECS must be a whole number of seconds")?,
            );
        }

        Ok(config)
    }

    /// Read a full configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Resolve target defaults and freeze the configuration.
    ///
    /// Token and server address are not checked here; a missing value is
    /// reported when the relay is enabled.
    pub fn resolve(self) -> Result<RelayConfig, ConfigError> {
        if let Some(index) = self.targets.iter().position(|t| t.url.trim().is_empty()) {
            return Err(ConfigError::MissingTargetUrl { index });
        }

        Ok(RelayConfig {
            token: self.token,
            server_address: self.server_address,
            targets: self.targets.into_iter().map(TargetConfig::resolve).collect(),
            dispatch_mode: self.dispatch_mode,
            webhook_timeout: self
                .webhook_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

fn load_targets_file(path: &str) -> Result<Vec<TargetConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read targets file {path}"))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse targets file {path}"))
}

/// Resolved configuration for one enabled session. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub token: String,
    pub server_address: String,
    /// Targets with every default filled in.
    pub targets: Vec<Target>,
    pub dispatch_mode: DispatchMode,
    pub webhook_timeout: Option<Duration>,
}

/// Configuration errors. Fatal to enabling the relay.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No configuration has been set")]
    NotConfigured,
    #[error("Server address is required")]
    MissingServerAddress,
    #[error("Client token is required")]
    MissingToken,
    #[error("Invalid server address {address:?}: {reason}")]
    InvalidServerAddress { address: String, reason: String },
    #[error("Target {index} has no URL")]
    MissingTargetUrl { index: usize },
    #[error("Stream endpoint {url} is not reachable, check the token and server address")]
    Unreachable {
        url: String,
        #[source]
        source: SessionError,
    },
}
