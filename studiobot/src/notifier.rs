//! Outbound chat link to the gateway.
//!
//! One WebSocket session, one configured destination channel. Delivery is
//! best-effort at-most-once: while the link is not ready, sends are dropped
//! with a warning, never queued for later. A dropped connection reconnects
//! forever with a fixed delay; a `LoggedOut` frame is terminal and the
//! process is expected to exit.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use studiobot_proto::gateway::{self, GatewayMessage};

/// Connection state of the chat link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connection; a reconnect attempt is pending.
    Disconnected,
    /// Connection and login in progress.
    Connecting,
    /// Logged in; sends go out.
    Ready,
    /// Logged out by the gateway. Terminal, no reconnect.
    Terminated,
}

/// A chat message received on the link.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel: String,
    pub sender: String,
    pub text: String,
}

/// Settings for [`spawn`].
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Gateway WebSocket URL.
    pub gateway_url: String,
    /// Session identity for the chat login.
    pub client_id: String,
    /// Destination channel for notifications. `None` degrades sends to log
    /// lines.
    pub channel: Option<String>,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
}

/// Outbound side handed to the diff pipeline, the scheduler jobs, and the
/// command handler. Cheap to clone.
#[derive(Clone)]
pub struct NotifierHandle {
    cmd_tx: mpsc::UnboundedSender<Outbound>,
    state: Arc<RwLock<LinkState>>,
    channel: Option<String>,
}

#[derive(Debug)]
struct Outbound {
    channel: String,
    text: String,
}

impl NotifierHandle {
    /// Current link state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    /// Sends `text` to the configured destination channel.
    ///
    /// Degrades to a log line when no channel is configured; drops the
    /// message with a warning when the link is not ready.
    pub fn send(&self, text: &str) {
        let Some(channel) = &self.channel else {
            tracing::info!(message = text, "no destination channel, logging instead of sending");
            return;
        };
        self.deliver(channel, text);
    }

    /// Sends `text` to an explicit channel (command replies).
    pub fn reply(&self, channel: &str, text: &str) {
        self.deliver(channel, text);
    }

    fn deliver(&self, channel: &str, text: &str) {
        let state = self.state();
        if state != LinkState::Ready {
            tracing::warn!(?state, channel, "link not ready, dropping message");
            return;
        }
        let cmd = Outbound {
            channel: channel.to_string(),
            text: text.to_string(),
        };
        if self.cmd_tx.send(cmd).is_err() {
            tracing::warn!(channel, "notifier task gone, dropping message");
        }
    }
}

/// Starts the notifier task.
///
/// Returns the send handle, the stream of inbound chat messages, and a
/// one-shot fired with the reason when the session is terminally logged out.
#[must_use]
pub fn spawn(
    config: NotifierConfig,
) -> (
    NotifierHandle,
    mpsc::UnboundedReceiver<InboundMessage>,
    oneshot::Receiver<String>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (fatal_tx, fatal_rx) = oneshot::channel();
    let state = Arc::new(RwLock::new(LinkState::Disconnected));

    let handle = NotifierHandle {
        cmd_tx,
        state: Arc::clone(&state),
        channel: config.channel.clone(),
    };

    tokio::spawn(run(config, state, cmd_rx, inbound_tx, fatal_tx));

    (handle, inbound_rx, fatal_rx)
}

enum SessionEnd {
    /// Connection dropped; reconnect.
    Dropped,
    /// Gateway sent `LoggedOut` with this reason. Terminal.
    LoggedOut(String),
    /// All handles dropped; the bot is shutting down.
    HandlesClosed,
}

async fn run(
    config: NotifierConfig,
    state: Arc<RwLock<LinkState>>,
    mut cmd_rx: mpsc::UnboundedReceiver<Outbound>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    fatal_tx: oneshot::Sender<String>,
) {
    loop {
        *state.write() = LinkState::Connecting;
        let ws = match connect_and_login(&config.gateway_url, &config.client_id).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(error = %e, delay = ?config.reconnect_delay, "chat connect failed, retrying");
                *state.write() = LinkState::Disconnected;
                drain_pending(&mut cmd_rx);
                tokio::time::sleep(config.reconnect_delay).await;
                continue;
            }
        };

        *state.write() = LinkState::Ready;
        tracing::info!(client_id = %config.client_id, "chat link ready");

        match run_session(ws, &mut cmd_rx, &inbound_tx).await {
            SessionEnd::Dropped => {
                tracing::warn!(delay = ?config.reconnect_delay, "chat link dropped, reconnecting");
                *state.write() = LinkState::Disconnected;
                drain_pending(&mut cmd_rx);
                tokio::time::sleep(config.reconnect_delay).await;
            }
            SessionEnd::LoggedOut(reason) => {
                tracing::error!(reason = %reason, "chat session logged out, not reconnecting");
                *state.write() = LinkState::Terminated;
                let _ = fatal_tx.send(reason);
                return;
            }
            SessionEnd::HandlesClosed => {
                tracing::info!("notifier handles dropped, chat task exiting");
                *state.write() = LinkState::Disconnected;
                return;
            }
        }
    }
}

/// Drops messages that slipped into the queue around a disconnect.
fn drain_pending(cmd_rx: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Ok(cmd) = cmd_rx.try_recv() {
        tracing::warn!(channel = %cmd.channel, "dropping message queued while disconnected");
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect_and_login(gateway_url: &str, client_id: &str) -> Result<WsStream, String> {
    let (mut ws, _response) = connect_async(gateway_url)
        .await
        .map_err(|e| format!("connect failed: {e}"))?;

    let login = GatewayMessage::Login {
        client_id: client_id.to_string(),
    };
    let text = gateway::encode(&login).map_err(|e| e.to_string())?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| format!("login send failed: {e}"))?;

    match ws.next().await {
        Some(Ok(Message::Text(data))) => match gateway::decode(data.as_str()) {
            Ok(GatewayMessage::LoginOk { .. }) => Ok(ws),
            Ok(GatewayMessage::Error { reason }) => Err(format!("login rejected: {reason}")),
            Ok(other) => Err(format!("unexpected login response: {other:?}")),
            Err(e) => Err(format!("malformed login response: {e}")),
        },
        Some(Ok(Message::Close(_))) | None => Err("closed during login".to_string()),
        Some(Ok(_)) => Err("unexpected non-text frame during login".to_string()),
        Some(Err(e)) => Err(format!("read failed during login: {e}")),
    }
}

async fn run_session(
    ws: WsStream,
    cmd_rx: &mut mpsc::UnboundedReceiver<Outbound>,
    inbound_tx: &mpsc::UnboundedSender<InboundMessage>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    return SessionEnd::HandlesClosed;
                };
                let frame = GatewayMessage::ChatSend {
                    channel: cmd.channel,
                    text: cmd.text,
                };
                let text = match gateway::encode(&frame) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode chat frame, dropping");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "chat send failed");
                    return SessionEnd::Dropped;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(data))) => match gateway::decode(data.as_str()) {
                        Ok(GatewayMessage::ChatMessage { channel, sender, text }) => {
                            let inbound = InboundMessage { channel, sender, text };
                            if inbound_tx.send(inbound).is_err() {
                                return SessionEnd::HandlesClosed;
                            }
                        }
                        Ok(GatewayMessage::LoggedOut { reason }) => {
                            return SessionEnd::LoggedOut(reason);
                        }
                        Ok(GatewayMessage::Error { reason }) => {
                            tracing::warn!(reason = %reason, "gateway error on chat link");
                        }
                        Ok(other) => {
                            tracing::debug!(?other, "unexpected frame on chat link");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "malformed chat frame, skipping");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "chat read error");
                        return SessionEnd::Dropped;
                    }
                }
            }
        }
    }
}
