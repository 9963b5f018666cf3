//! Plugin Facade
//!
//! Host-facing lifecycle: default configuration, configuration acceptance,
//! enable, disable and display text. Owns at most one live [`Session`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};
use url::Url;

use crate::config::{ConfigError, HostConfig, RelayConfig};
use crate::error::RelayError;
use crate::stream::{self, Session, SessionError, SessionOptions, SessionState};
use crate::webhooks::Dispatcher;

/// Static plugin metadata shown by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub module_path: &'static str,
    pub name: &'static str,
    pub author: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

/// Metadata for this plugin.
pub const PLUGIN_INFO: PluginInfo = PluginInfo {
    module_path: "github.com/yourorg/notify-relay",
    name: "multi-notifier",
    author: "Notify Relay Contributors",
    version: env!("CARGO_PKG_VERSION"),
    description: "Forward stream notifications to more notify servers",
};

/// Relays notification stream events to webhook targets.
pub struct MultiNotifier {
    config: Option<Arc<RelayConfig>>,
    session: Option<Session>,
    http: reqwest::Client,
    options: SessionOptions,
}

impl Default for MultiNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiNotifier {
    /// Create an unconfigured, disabled instance.
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default())
    }

    /// Create an instance with custom session timing.
    pub fn with_options(options: SessionOptions) -> Self {
        Self {
            config: None,
            session: None,
            http: reqwest::Client::new(),
            options,
        }
    }

    /// Use a preconfigured HTTP client for webhook delivery.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Plugin metadata.
    pub const fn info() -> PluginInfo {
        PLUGIN_INFO
    }

    /// Configuration offered to the host before the user edits it.
    pub fn default_config() -> HostConfig {
        HostConfig::default()
    }

    /// Validate a configuration and store it for the next enable.
    ///
    /// A running session keeps the configuration it was started with.
    pub fn validate_and_set_config(&mut self, config: HostConfig) -> Result<(), ConfigError> {
        let resolved = config.resolve()?;
        info!(targets = resolved.targets.len(), "Configuration accepted");
        if self.is_enabled() {
            warn!("Configuration changed while enabled; re-enable to apply it");
        }
        self.config = Some(Arc::new(resolved));
        Ok(())
    }

    /// The stored configuration, if any.
    pub fn config(&self) -> Option<&RelayConfig> {
        self.config.as_deref()
    }

    /// Whether a session is running.
    pub fn is_enabled(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    /// State of the current session, `Idle` if none was started.
    pub fn session_state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, Session::state)
    }

    /// Watch state transitions of the current session.
    pub fn subscribe(&self) -> Option<watch::Receiver<SessionState>> {
        self.session.as_ref().map(Session::subscribe)
    }

    /// Connect to the stream and start relaying.
    ///
    /// Missing token or server address, or an unreachable stream endpoint,
    /// fail here and leave the instance disabled.
    pub async fn enable(&mut self) -> Result<(), RelayError> {
        if self.is_enabled() {
            return Err(SessionError::AlreadyActive.into());
        }
        let config = self.config.clone().ok_or(ConfigError::NotConfigured)?;

        let url = stream::stream_url(&config.server_address, &config.token)?;
        let dispatcher = Dispatcher::new(self.http.clone(), Arc::clone(&config));

        let session = Session::start(&url, dispatcher, self.options.clone())
            .await
            .map_err(|source| ConfigError::Unreachable {
                url: stream::redact(&url),
                source,
            })?;

        // A previous session that already ended is replaced here.
        if let Some(previous) = self.session.replace(session) {
            if let Err(e) = previous.wait().await {
                info!(error = %e, "Previous session had failed");
            }
        }

        info!(targets = config.targets.len(), "Relay enabled");
        Ok(())
    }

    /// Close the session gracefully. Does nothing when not enabled.
    ///
    /// Returns the error that ended the session if it had already failed.
    pub async fn disable(&mut self) -> Result<(), SessionError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let result = session.shutdown().await;
        info!("Relay disabled");
        result
    }

    /// Wait for the current session to end on its own.
    pub async fn wait(&mut self) -> Result<(), SessionError> {
        match self.session.take() {
            Some(session) => session.wait().await,
            None => Ok(()),
        }
    }

    /// Help text for the host's plugin page.
    pub fn display(&self, location: Option<&Url>) -> String {
        let server = location.map_or_else(
            || {
                self.config
                    .as_ref()
                    .map_or(crate::config::DEFAULT_SERVER_ADDRESS, |c| {
                        c.server_address.as_str()
                    })
                    .to_string()
            },
            |l| l.origin().ascii_serialization(),
        );

        format!(
            r#"How to configure:

1. Create a new client and copy its token into `token`.
2. Set `serverAddress` to your server (currently {server}).
   Events are read from `<serverAddress>/stream`.
3. Add one entry under `targets` for every webhook that should receive
   notifications. `$title` and `$message` are replaced in `body` and in
   header values. Unset fields default to method POST, body
   {{"msg":"$title\n$message"}} and header Content-Type: application/json.

Example:

targets:
  - url: http://192.168.1.2:10201/api/sendTextMsg
    method: POST
    body: "{{\"wxid\":\"xxxxxxxx\",\"msg\":\"$title\n$message\"}}"
  - url: "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=xxxxxx"
    body: "{{\"msgtype\":\"text\",\"text\":{{\"content\":\"$title\n$message\"}}}}"

Disable and re-enable the plugin after changing the configuration.
"#
        )
    }
}
