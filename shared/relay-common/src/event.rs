//! Event Types

use serde::{Deserialize, Serialize};

use crate::Result;

/// A notification received over the stream.
///
/// The stream sends more fields than these (`id`, `appid`, `priority`,
/// `date`, `extras`); they are ignored. A missing `title` or `message`
/// decodes as an empty string since the server omits empty titles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Notification title.
    #[serde(default)]
    pub title: String,
    /// Notification body.
    #[serde(default)]
    pub message: String,
}

impl Event {
    /// Create an event from its parts.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    /// Decode one inbound frame.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(frame)?)
    }
}
