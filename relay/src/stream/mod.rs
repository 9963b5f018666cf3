//! Notification Stream
//!
//! Holds the long-lived websocket session to the notification server and
//! feeds decoded events to the webhook dispatcher.

pub mod session;

pub use session::{
    Session, SessionError, SessionOptions, SessionState, CLOSE_GRACE_PERIOD, HEARTBEAT_INTERVAL,
};

use url::Url;

use crate::config::ConfigError;

/// Path of the stream endpoint, relative to the server address.
pub const STREAM_PATH: &str = "/stream";

/// Build the websocket URL for a server address and client token.
///
/// `http`/`https` addresses are mapped to `ws`/`wss`, a trailing slash is
/// dropped and the token is form-encoded into the query.
pub fn stream_url(server_address: &str, token: &str) -> Result<Url, ConfigError> {
    let address = server_address.trim();
    if address.is_empty() {
        return Err(ConfigError::MissingServerAddress);
    }
    if token.is_empty() {
        return Err(ConfigError::MissingToken);
    }

    let base = if let Some(rest) = address.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = address.strip_prefix("https://") {
        format!("wss://{rest}")
    } else {
        address.to_string()
    };

    let invalid = |reason: String| ConfigError::InvalidServerAddress {
        address: server_address.to_string(),
        reason,
    };

    let mut url = Url::parse(&format!("{}{STREAM_PATH}", base.trim_end_matches('/')))
        .map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    url.query_pairs_mut().append_pair("token", token);

    Ok(url)
}

/// Stream URL with the token stripped, for logging.
pub fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.to_string()
}
