//! Stream Session
//!
//! One websocket connection to the notification server and its two
//! background tasks: the read loop, which decodes frames and dispatches them,
//! and the coordinator, which owns the write half, sends heartbeats and
//! performs the close handshake.

use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use relay_common::Event;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::redact;
use crate::webhooks::Dispatcher;

/// Interval between heartbeat frames.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// How long a graceful close waits for the server to acknowledge.
pub const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type ReaderHandle = JoinHandle<Result<(), SessionError>>;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    /// Whether the session has ended.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Session timing and interrupt source.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub heartbeat_interval: Duration,
    pub close_grace: Duration,
    /// Cancelled by the host on a process interrupt (Ctrl+C). The session
    /// then closes gracefully.
    pub interrupt: Option<CancellationToken>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            close_grace: CLOSE_GRACE_PERIOD,
            interrupt: None,
        }
    }
}

/// Connection-class errors. Any of these ends the session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A session is already active")]
    AlreadyActive,
    #[error("Failed to connect: {0}")]
    Connect(#[source] Box<WsError>),
    #[error("Failed to read from stream: {0}")]
    Read(#[source] Box<WsError>),
    #[error("Failed to decode stream frame: {0}")]
    Decode(#[source] relay_common::Error),
    #[error("Failed to send heartbeat: {0}")]
    Heartbeat(#[source] Box<WsError>),
    #[error("Session task failed: {0}")]
    Task(#[from] JoinError),
}

/// A live stream session.
///
/// Dropping the session requests a graceful close in the background.
pub struct Session {
    state: watch::Receiver<SessionState>,
    shutdown: CancellationToken,
    coordinator: Option<JoinHandle<Result<(), SessionError>>>,
}

impl Session {
    /// Connect to `url` and start the read loop and heartbeat.
    ///
    /// Fails without spawning anything if the connection cannot be
    /// established. There is no retry.
    pub async fn start(
        url: &Url,
        dispatcher: Dispatcher,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let endpoint = redact(url);
        info!(url = %endpoint, "Connecting to notification stream");

        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            error!(url = %endpoint, error = %e, "Failed to connect to notification stream");
            SessionError::Connect(Box::new(e))
        })?;

        info!(url = %endpoint, "Connected to notification stream");
        let (state_tx, state_rx) = watch::channel(SessionState::Connected);
        let shutdown = CancellationToken::new();

        let (sink, source) = ws_stream.split();
        let reader = tokio::spawn(read_loop(source, dispatcher));
        let coordinator = tokio::spawn(coordinate(
            sink,
            reader,
            state_tx,
            shutdown.clone(),
            options,
        ));

        Ok(Self {
            state: state_rx,
            shutdown,
            coordinator: Some(coordinator),
        })
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Whether the session is still running.
    pub fn is_active(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Wait for the session to end on its own.
    ///
    /// Returns the error that ended it, if any.
    pub async fn wait(mut self) -> Result<(), SessionError> {
        match self.coordinator.take() {
            Some(handle) => handle.await?,
            None => Ok(()),
        }
    }

    /// Close gracefully and wait for the session to end.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        self.shutdown.cancel();
        self.wait().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Decode text frames in arrival order and dispatch each event before reading
/// the next frame. Binary frames carry no events and are skipped.
async fn read_loop(mut source: WsSource, dispatcher: Dispatcher) -> Result<(), SessionError> {
    while let Some(frame) = source.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => Event::decode(text.as_bytes()),
            Ok(Message::Binary(data)) => {
                debug!(len = data.len(), "Skipping binary frame");
                continue;
            }
            Ok(Message::Close(frame)) => {
                info!(?frame, "Stream closed by server");
                return Ok(());
            }
            // Ping/pong are answered by the protocol layer
            Ok(_) => continue,
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(()),
            Err(e) => return Err(SessionError::Read(Box::new(e))),
        };
        let event = decoded.map_err(SessionError::Decode)?;

        debug!(title = %event.title, "Received event");
        let outcomes = dispatcher.dispatch(&event).await;
        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        info!(targets = outcomes.len(), delivered, "Event dispatched");
    }

    Ok(())
}

/// Multiplex reader completion, shutdown, interrupt and heartbeat ticks
/// until the session ends.
async fn coordinate(
    mut sink: WsSink,
    mut reader: ReaderHandle,
    state: watch::Sender<SessionState>,
    shutdown: CancellationToken,
    options: SessionOptions,
) -> Result<(), SessionError> {
    let period = options.heartbeat_interval;
    let mut heartbeat = interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let interrupt = options.interrupt.clone();
    let interrupt = wait_for_interrupt(interrupt.as_ref());
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            biased;

            joined = &mut reader => {
                state.send_replace(SessionState::Closing);
                let result = joined.map_err(SessionError::from).and_then(|r| r);
                if let Err(e) = &result {
                    error!(error = %e, "Stream session failed");
                }
                if let Err(e) = sink.close().await {
                    debug!(error = %e, "Failed to close stream");
                }
                return finish(&state, result);
            }
            () = shutdown.cancelled() => {
                info!("Stream shutdown requested");
                let result = close_gracefully(sink, reader, &state, options.close_grace).await;
                return finish(&state, result);
            }
            () = &mut interrupt => {
                info!("Interrupt received");
                let result = close_gracefully(sink, reader, &state, options.close_grace).await;
                return finish(&state, result);
            }
            _ = heartbeat.tick() => {
                let stamp = chrono::Local::now().to_string();
                if let Err(e) = sink.send(Message::text(stamp)).await {
                    error!(error = %e, "Failed to send heartbeat");
                    state.send_replace(SessionState::Closing);
                    reader.abort();
                    return finish(&state, Err(SessionError::Heartbeat(Box::new(e))));
                }
            }
        }
    }
}

/// Send a close frame and give the server `grace` to finish the handshake.
///
/// The handshake is complete once the read loop sees the connection end.
/// After `grace` the read loop is aborted and the connection dropped.
async fn close_gracefully(
    mut sink: WsSink,
    mut reader: ReaderHandle,
    state: &watch::Sender<SessionState>,
    grace: Duration,
) -> Result<(), SessionError> {
    state.send_replace(SessionState::Closing);

    let close = Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: String::new().into(),
    }));
    if let Err(e) = sink.send(close).await {
        warn!(error = %e, "Failed to send close frame");
    }

    match timeout(grace, &mut reader).await {
        Ok(Ok(Ok(()))) => debug!("Server acknowledged close"),
        Ok(Ok(Err(e))) => debug!(error = %e, "Stream ended with error while closing"),
        Ok(Err(e)) => warn!(error = %e, "Stream reader task failed while closing"),
        Err(_) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Server did not acknowledge close, forcing"
            );
            reader.abort();
        }
    }

    Ok(())
}

fn finish(
    state: &watch::Sender<SessionState>,
    result: Result<(), SessionError>,
) -> Result<(), SessionError> {
    let terminal = if result.is_ok() {
        SessionState::Closed
    } else {
        SessionState::Failed
    };
    state.send_replace(terminal);
    info!(state = ?terminal, "Stream session ended");
    result
}

async fn wait_for_interrupt(interrupt: Option<&CancellationToken>) {
    match interrupt {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}
