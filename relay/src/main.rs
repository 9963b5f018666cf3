//! Notify Relay - Main Entry Point
//!
//! Standalone host: loads configuration from the environment, enables the
//! relay and runs until the stream session ends or Ctrl+C is pressed.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use notify_relay::stream::SessionOptions;
use notify_relay::{HostConfig, MultiNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    // Install the rustls crypto provider used by wss:// streams and
    // https:// webhook targets
    let _ =
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());

    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notify_relay=debug,relay_common=info".into()),
        )
        .json()
        .init();

    let host_config = HostConfig::from_env()?;

    let info = MultiNotifier::info();
    info!(version = info.version, name = info.name, "Starting Notify Relay");

    // Ctrl+C closes the session gracefully
    let interrupt = CancellationToken::new();
    let on_signal = interrupt.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, closing stream...");
                on_signal.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to install CTRL+C signal handler"),
        }
    });

    let mut relay = MultiNotifier::with_options(SessionOptions {
        interrupt: Some(interrupt),
        ..SessionOptions::default()
    });
    relay.validate_and_set_config(host_config)?;
    relay.enable().await?;

    match relay.wait().await {
        Ok(()) => {
            info!("Relay shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Relay stopped with error");
            Err(e.into())
        }
    }
}
