//! Webhook Delivery
//!
//! Renders per-target request templates and performs best-effort HTTP
//! delivery of stream events.

pub mod dispatch;
pub mod types;

pub use dispatch::{build_request, Dispatcher};
pub use types::{DeliveryOutcome, DispatchError, DispatchMode, Target, TargetConfig};
