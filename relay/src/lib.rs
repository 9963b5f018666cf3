//! Notify Relay
//!
//! Reads notifications from a server's websocket stream and forwards each one
//! to a list of webhook targets, rendering `$title` and `$message` into every
//! target's request template.

pub mod config;
pub mod error;
pub mod plugin;
pub mod stream;
pub mod webhooks;

pub use config::{ConfigError, HostConfig, RelayConfig};
pub use error::RelayError;
pub use plugin::{MultiNotifier, PluginInfo, PLUGIN_INFO};
pub use relay_common::Event;
