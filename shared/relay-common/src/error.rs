//! Common Error Types

use thiserror::Error;

/// Errors produced while handling stream payloads.
#[derive(Error, Debug)]
pub enum Error {
    /// The inbound frame is not a valid event object.
    #[error("Invalid event payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
