//! Webhook Event Dispatch
//!
//! Fans one event out to every configured target. Each target gets exactly
//! one attempt; a failure is logged and never stops the remaining targets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use relay_common::{template, Event};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::types::{DeliveryOutcome, DispatchError, DispatchMode, Target};
use crate::config::RelayConfig;

/// Bytes of a webhook response kept for the debug log.
const RESPONSE_PREVIEW_BYTES: usize = 200;

/// How long to wait for the first body chunk of a webhook response.
const RESPONSE_PREVIEW_TIMEOUT: Duration = Duration::from_secs(1);

/// Delivers events to the targets of one resolved configuration.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    config: Arc<RelayConfig>,
}

impl Dispatcher {
    pub const fn new(client: reqwest::Client, config: Arc<RelayConfig>) -> Self {
        Self { client, config }
    }

    /// Attempt delivery of `event` to every target.
    ///
    /// Returns one outcome per target, in target order, regardless of the
    /// dispatch mode.
    pub async fn dispatch(&self, event: &Event) -> Vec<DeliveryOutcome> {
        let targets = self.config.targets.iter().enumerate();

        match self.config.dispatch_mode {
            DispatchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(self.config.targets.len());
                for (index, target) in targets {
                    outcomes.push(self.deliver(index, target, event).await);
                }
                outcomes
            }
            DispatchMode::Concurrent => {
                join_all(targets.map(|(index, target)| self.deliver(index, target, event))).await
            }
        }
    }

    async fn deliver(&self, index: usize, target: &Target, event: &Event) -> DeliveryOutcome {
        let start = Instant::now();
        let result = self.send(target, event).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(status) if (200..300).contains(status) => {
                info!(target_index = index, url = %target.url, status, latency_ms, "Webhook delivered");
            }
            Ok(status) => {
                warn!(target_index = index, url = %target.url, status, latency_ms, "Webhook responded with non-success status");
            }
            Err(e) => {
                warn!(target_index = index, url = %target.url, error = %e, latency_ms, "Webhook delivery failed");
            }
        }

        DeliveryOutcome {
            index,
            url: target.url.clone(),
            result,
        }
    }

    async fn send(&self, target: &Target, event: &Event) -> Result<u16, DispatchError> {
        let request = build_request(&self.client, target, event, self.config.webhook_timeout)?;

        let mut response = self.client.execute(request).await?;
        let status = response.status().as_u16();

        // Only the first chunk is read for the log preview; the rest of the
        // body is dropped with the response.
        match timeout(RESPONSE_PREVIEW_TIMEOUT, response.chunk()).await {
            Err(_) => debug!(url = %target.url, status, "Webhook response body not ready, skipping preview"),
            Ok(Ok(Some(chunk))) => {
                let preview = String::from_utf8_lossy(&chunk[..chunk.len().min(RESPONSE_PREVIEW_BYTES)]);
                debug!(url = %target.url, status, response = %preview, "Webhook response");
            }
            Ok(Ok(None)) => debug!(url = %target.url, status, "Webhook response with empty body"),
            Ok(Err(e)) => debug!(url = %target.url, status, error = %e, "Failed to read webhook response body"),
        }

        Ok(status)
    }
}

/// Build the HTTP request for one target and event.
///
/// The body and every header value are rendered with the event's fields.
pub fn build_request(
    client: &reqwest::Client,
    target: &Target,
    event: &Event,
    timeout: Option<Duration>,
) -> Result<reqwest::Request, DispatchError> {
    let method = Method::from_bytes(target.method.as_bytes())
        .map_err(|_| DispatchError::InvalidMethod(target.method.clone()))?;

    let mut headers = HeaderMap::with_capacity(target.headers.len());
    for (name, value) in &target.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| DispatchError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(&template::render(value, event)).map_err(|e| {
            DispatchError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        headers.append(header_name, header_value);
    }

    let body = template::render(&target.body, event);
    debug!(url = %target.url, method = %method, body = %body, "Rendered webhook request");

    let mut builder = client
        .request(method, target.url.as_str())
        .headers(headers)
        .body(body);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}
