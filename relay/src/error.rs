//! Relay Error Types

use thiserror::Error;

use crate::config::ConfigError;
use crate::stream::SessionError;

/// Errors returned by the plugin's lifecycle calls.
///
/// Webhook delivery errors never appear here; they stay with the
/// [`DeliveryOutcome`](crate::webhooks::DeliveryOutcome) of the target that
/// produced them.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}
