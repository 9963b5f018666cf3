//! Reusable test helpers for relay integration tests.
//!
//! Provides [`MockStream`], a local websocket server standing in for the
//! notification stream, plus configuration and webhook polling utilities.
//! Webhook targets are mocked with `wiremock`.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use notify_relay::stream::SessionOptions;
use notify_relay::webhooks::TargetConfig;
use notify_relay::{HostConfig, RelayConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use wiremock::MockServer;

/// How long helpers wait for something to arrive before giving up.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Mock notification stream
// ============================================================================

/// Whether the mock server answers the client's close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseBehavior {
    /// Read frames and complete the close handshake.
    Acknowledge,
    /// Accept the connection, then never read from it again.
    Ignore,
}

/// What the test asks the connected peer to do next.
#[derive(Debug)]
enum PeerCommand {
    Frame(Message),
    /// Drop the TCP connection with a reset instead of a close handshake.
    Reset,
}

/// Local websocket server that records what the relay sends and lets the
/// test push frames to it.
pub struct MockStream {
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<PeerCommand>,
    inbound: mpsc::UnboundedReceiver<Message>,
    request_uris: Arc<StdMutex<Vec<String>>>,
}

impl MockStream {
    /// Start a server that completes the close handshake.
    pub async fn start() -> Self {
        Self::start_with(CloseBehavior::Acknowledge).await
    }

    /// Start a server that never answers a close frame.
    pub async fn start_unresponsive() -> Self {
        Self::start_with(CloseBehavior::Ignore).await
    }

    async fn start_with(behavior: CloseBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock stream");
        let addr = listener.local_addr().expect("Mock stream has no address");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let request_uris = Arc::new(StdMutex::new(Vec::new()));

        tokio::spawn(accept_loop(
            listener,
            behavior,
            Arc::new(Mutex::new(outbound_rx)),
            inbound_tx,
            Arc::clone(&request_uris),
        ));

        Self {
            addr,
            outbound: outbound_tx,
            inbound: inbound_rx,
            request_uris,
        }
    }

    /// Address to put in the relay's `serverAddress`.
    pub fn server_address(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Push a raw text frame to the connected client.
    pub fn send_text(&self, text: &str) {
        self.send_frame(Message::text(text.to_string()));
    }

    /// Push a notification the way the server formats it.
    pub fn send_event(&self, title: &str, message: &str) {
        let frame = serde_json::json!({
            "id": 1,
            "appid": 1,
            "title": title,
            "message": message,
            "priority": 5,
            "date": "2024-01-01T00:00:00Z",
        });
        self.send_text(&frame.to_string());
    }

    /// Start the close handshake from the server side.
    pub fn send_close(&self) {
        self.send_frame(Message::Close(None));
    }

    /// Push a binary frame to the connected client.
    pub fn send_binary(&self, data: &[u8]) {
        self.send_frame(Message::binary(data.to_vec()));
    }

    /// Reset the TCP connection (`SO_LINGER` 0) without a close frame.
    pub fn reset(&self) {
        self.outbound
            .send(PeerCommand::Reset)
            .expect("Mock stream stopped");
    }

    fn send_frame(&self, message: Message) {
        self.outbound
            .send(PeerCommand::Frame(message))
            .expect("Mock stream stopped");
    }

    /// Next frame received from the client.
    pub async fn next_message(&mut self) -> Option<Message> {
        timeout(WAIT_TIMEOUT, self.inbound.recv()).await.ok().flatten()
    }

    /// Wait for a close frame from the client, skipping heartbeats.
    pub async fn wait_for_close(&mut self) -> bool {
        while let Some(message) = self.next_message().await {
            if message.is_close() {
                return true;
            }
        }
        false
    }

    /// Collect `count` text frames from the client.
    pub async fn text_frames(&mut self, count: usize) -> Vec<String> {
        let mut frames = Vec::with_capacity(count);
        while frames.len() < count {
            match self.next_message().await {
                Some(Message::Text(text)) => frames.push(text.to_string()),
                Some(_) => {}
                None => break,
            }
        }
        frames
    }

    /// Request URIs (path and query) of every accepted connection.
    pub fn request_uris(&self) -> Vec<String> {
        self.request_uris.lock().unwrap().clone()
    }
}

async fn accept_loop(
    listener: TcpListener,
    behavior: CloseBehavior,
    outbound: Arc<Mutex<mpsc::UnboundedReceiver<PeerCommand>>>,
    inbound: mpsc::UnboundedSender<Message>,
    request_uris: Arc<StdMutex<Vec<String>>>,
) {
    while let Ok((tcp, _)) = listener.accept().await {
        let uris = Arc::clone(&request_uris);
        let callback = move |req: &Request, resp: Response| {
            uris.lock().unwrap().push(req.uri().to_string());
            Ok::<Response, ErrorResponse>(resp)
        };
        let Ok(ws) = accept_hdr_async(tcp, callback).await else {
            continue;
        };

        match behavior {
            CloseBehavior::Acknowledge => {
                tokio::spawn(serve_connection(
                    ws,
                    Arc::clone(&outbound),
                    inbound.clone(),
                ));
            }
            CloseBehavior::Ignore => {
                tokio::spawn(async move {
                    let _held = ws;
                    std::future::pending::<()>().await;
                });
            }
        }
    }
}

async fn serve_connection(
    mut ws: WebSocketStream<TcpStream>,
    outbound: Arc<Mutex<mpsc::UnboundedReceiver<PeerCommand>>>,
    inbound: mpsc::UnboundedSender<Message>,
) {
    let mut outbound = outbound.lock().await;
    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(PeerCommand::Frame(message)) => {
                    if ws.send(message).await.is_err() {
                        break;
                    }
                }
                Some(PeerCommand::Reset) => {
                    let _ = ws.get_ref().set_linger(Some(Duration::ZERO));
                    break;
                }
                None => break,
            },
            frame = ws.next() => match frame {
                Some(Ok(message)) => {
                    let _ = inbound.send(message);
                }
                _ => break,
            },
        }
    }
}

/// A `ws://` address nothing is listening on.
pub async fn unused_server_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}

// ============================================================================
// Configuration
// ============================================================================

/// Session options with default timing and no interrupt source.
pub fn test_options() -> SessionOptions {
    SessionOptions::default()
}

/// Session options whose interrupt fires when `interrupt` is cancelled.
pub fn interruptible_options(interrupt: &CancellationToken) -> SessionOptions {
    SessionOptions {
        interrupt: Some(interrupt.clone()),
        ..SessionOptions::default()
    }
}

/// Host configuration for a token, address and targets.
pub fn host_config(token: &str, server_address: &str, targets: Vec<TargetConfig>) -> HostConfig {
    HostConfig {
        token: token.to_string(),
        server_address: server_address.to_string(),
        targets,
        ..HostConfig::default()
    }
}

/// Resolved configuration for a token, address and targets.
pub fn relay_config(
    token: &str,
    server_address: &str,
    targets: Vec<TargetConfig>,
) -> Arc<RelayConfig> {
    Arc::new(
        host_config(token, server_address, targets)
            .resolve()
            .expect("Invalid test config"),
    )
}

/// Target pointing at `path` on a wiremock server, all other fields default.
pub fn target_for(server: &MockServer, path: &str) -> TargetConfig {
    TargetConfig::new(format!("{}{path}", server.uri()))
}

// ============================================================================
// Webhooks
// ============================================================================

/// Poll a wiremock server until it has seen `count` requests.
pub async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= count || Instant::now() >= deadline {
            return requests;
        }
        sleep(Duration::from_millis(20)).await;
    }
}
