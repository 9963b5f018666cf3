//! Notify Relay Common Library
//!
//! Event payloads received from the notification stream and the template
//! renderer used to build outbound webhook requests.

pub mod error;
pub mod event;
pub mod template;

pub use error::{Error, Result};
pub use event::Event;
pub use template::render;
