//! WebSocket-backed store client.
//!
//! Implements the [`TaskStore`] trait over a gateway connection: one-shot
//! path reads, path writes, and a full-value subscription to the task
//! collection. The gateway pushes the complete collection on every change
//! (never deltas); this client hands those raw values to the caller, who
//! normalizes and diffs them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use studiobot_proto::gateway::{self, GatewayMessage};
use studiobot_proto::member::{self, Member};
use studiobot_proto::task::{self, Task, TaskStatus};

use super::{StoreError, TaskStore};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for connecting to the gateway.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for waiting for a `LoginOk` acknowledgment.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for a one-shot fetch round trip.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffer size for the snapshot push channel.
const SNAPSHOT_BUFFER: usize = 16;

/// Store client over a gateway WebSocket session.
///
/// Created via [`GatewayStore::connect`], which logs in and spawns a
/// background reader task. Fetches are serialized through an internal
/// request lock so responses pair with requests.
pub struct GatewayStore {
    /// Write half of the WebSocket connection.
    ws_sender: Arc<Mutex<WsSender>>,
    /// Serializes fetch request/response pairs.
    fetch_lock: Mutex<()>,
    /// Fetch results delivered by the background reader task.
    fetch_rx: Mutex<mpsc::Receiver<(String, serde_json::Value)>>,
    /// Full-value snapshot pushes for the subscribed task collection.
    snapshot_rx: Mutex<Option<mpsc::Receiver<serde_json::Value>>>,
    /// Whether the gateway connection is active.
    connected: Arc<AtomicBool>,
    /// Handle to the background reader task.
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl GatewayStore {
    /// Connects to the gateway and logs in as `client_id`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if connection or login times out.
    /// - [`StoreError::Unreachable`] if the gateway cannot be reached or
    ///   rejects the login.
    /// - [`StoreError::ConnectionClosed`] if the socket closes mid-handshake.
    pub async fn connect(gateway_url: &str, client_id: &str) -> Result<Self, StoreError> {
        let (ws_stream, _response) =
            tokio::time::timeout(CONNECT_TIMEOUT, connect_async(gateway_url))
                .await
                .map_err(|_| {
                    tracing::warn!(url = gateway_url, "gateway connect timed out");
                    StoreError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url = gateway_url, err = %e, "gateway connect failed");
                    StoreError::Unreachable(e.to_string())
                })?;

        let (mut ws_sender, mut ws_reader) = ws_stream.split();

        let login = GatewayMessage::Login {
            client_id: client_id.to_string(),
        };
        let text = gateway::encode(&login)?;
        ws_sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "failed to send Login");
                StoreError::Unreachable(format!("failed to send Login: {e}"))
            })?;

        let ack = tokio::time::timeout(LOGIN_TIMEOUT, ws_reader.next())
            .await
            .map_err(|_| {
                tracing::warn!(url = gateway_url, "gateway login acknowledgment timed out");
                StoreError::Timeout
            })?;

        match ack {
            Some(Ok(Message::Text(data))) => match gateway::decode(data.as_str()) {
                Ok(GatewayMessage::LoginOk { client_id: id }) => {
                    tracing::info!(client_id = %id, url = gateway_url, "store session logged in");
                }
                Ok(GatewayMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "gateway login rejected");
                    return Err(StoreError::Unreachable(format!(
                        "login rejected: {reason}"
                    )));
                }
                Ok(other) => {
                    tracing::warn!(?other, "unexpected gateway response during login");
                    return Err(StoreError::Unreachable(
                        "unexpected response during login".to_string(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed login response");
                    return Err(e.into());
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                tracing::warn!("gateway closed connection during login");
                return Err(StoreError::ConnectionClosed);
            }
            Some(Ok(_)) => {
                tracing::warn!("unexpected non-text frame during login");
                return Err(StoreError::Unreachable(
                    "unexpected non-text frame during login".to_string(),
                ));
            }
            Some(Err(e)) => {
                tracing::warn!(err = %e, "WebSocket error during login");
                return Err(StoreError::Unreachable(e.to_string()));
            }
        }

        let (fetch_tx, fetch_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_connected = Arc::clone(&connected);

        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            fetch_tx,
            snapshot_tx,
            reader_connected,
        ));

        Ok(Self {
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            fetch_lock: Mutex::new(()),
            fetch_rx: Mutex::new(fetch_rx),
            snapshot_rx: Mutex::new(Some(snapshot_rx)),
            connected,
            _reader_handle: reader_handle,
        })
    }

    /// Whether the gateway connection is currently active.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Subscribes to the task collection and returns the snapshot stream.
    ///
    /// The gateway pushes the full current value immediately, then again on
    /// every change. The receiver yields raw values; callers normalize.
    /// Can be called once per connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionClosed`] if the connection is down or
    /// the subscription was already taken.
    pub async fn subscribe_tasks(
        &self,
    ) -> Result<mpsc::Receiver<serde_json::Value>, StoreError> {
        let mut slot = self.snapshot_rx.lock().await;
        let rx = slot.take().ok_or(StoreError::ConnectionClosed)?;
        drop(slot);
        self.send_frame(&GatewayMessage::Subscribe {
            path: "tasks".to_string(),
        })
        .await?;
        Ok(rx)
    }

    /// One-shot read of a store path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionClosed`] if the connection is down,
    /// or [`StoreError::Timeout`] if no response arrives in time.
    pub async fn fetch(&self, path: &str) -> Result<serde_json::Value, StoreError> {
        // One fetch at a time so responses pair with requests.
        let _guard = self.fetch_lock.lock().await;
        self.send_frame(&GatewayMessage::Fetch {
            path: path.to_string(),
        })
        .await?;

        let mut rx = self.fetch_rx.lock().await;
        loop {
            let result = tokio::time::timeout(FETCH_TIMEOUT, rx.recv())
                .await
                .map_err(|_| StoreError::Timeout)?;
            match result {
                Some((got_path, value)) if got_path == path => return Ok(value),
                Some((got_path, _)) => {
                    // Stale response from an earlier timed-out fetch.
                    tracing::debug!(expected = %path, got = %got_path, "skipping stale fetch result");
                }
                None => return Err(StoreError::ConnectionClosed),
            }
        }
    }

    /// Encodes and sends one frame, marking the connection dead on failure.
    async fn send_frame(&self, msg: &GatewayMessage) -> Result<(), StoreError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(StoreError::ConnectionClosed);
        }
        let text = gateway::encode(msg)?;
        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "gateway send failed");
                self.connected.store(false, Ordering::Relaxed);
                StoreError::ConnectionClosed
            })?;
        Ok(())
    }
}

impl TaskStore for GatewayStore {
    /// Fetches and normalizes the full task collection.
    async fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let value = self.fetch("tasks").await?;
        Ok(task::normalize(&value)?)
    }

    /// Fetches and normalizes the member collection.
    async fn fetch_members(&self) -> Result<Vec<Member>, StoreError> {
        let value = self.fetch("members").await?;
        Ok(member::normalize(&value)?)
    }

    /// Writes a task's status. Fire-and-forget: the gateway reports write
    /// failures on its own log; watchers see the result as a value push.
    async fn update_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        self.send_frame(&GatewayMessage::Update {
            path: format!("tasks/{task_id}/status"),
            value: serde_json::json!(status.to_string()),
        })
        .await
    }

    /// Marks one checklist item as done.
    async fn set_checklist_done(&self, task_id: &str, index: usize) -> Result<(), StoreError> {
        self.send_frame(&GatewayMessage::Update {
            path: format!("tasks/{task_id}/checklist/{index}/done"),
            value: serde_json::json!(true),
        })
        .await
    }
}

/// Background task that reads gateway frames and dispatches them.
///
/// Fetch results and snapshot pushes go to their channels; malformed frames
/// are logged and skipped. A `LoggedOut` frame or socket close ends the
/// task and marks the connection dead.
async fn reader_loop(
    mut ws_reader: WsReader,
    fetch_tx: mpsc::Sender<(String, serde_json::Value)>,
    snapshot_tx: mpsc::Sender<serde_json::Value>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Text(data)) => match gateway::decode(data.as_str()) {
                Ok(GatewayMessage::FetchResult { path, value }) => {
                    if fetch_tx.send((path, value)).await.is_err() {
                        break;
                    }
                }
                Ok(GatewayMessage::ValueChanged { path, value }) => {
                    if path == "tasks" {
                        if snapshot_tx.send(value).await.is_err() {
                            break;
                        }
                    } else {
                        tracing::debug!(path = %path, "value push for unwatched path");
                    }
                }
                Ok(GatewayMessage::LoggedOut { reason }) => {
                    tracing::error!(reason = %reason, "store session logged out by gateway");
                    break;
                }
                Ok(GatewayMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "gateway error");
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected gateway frame");
                }
                Err(e) => {
                    // Malformed frame: log and skip, don't disconnect.
                    tracing::warn!(err = %e, "malformed gateway frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("gateway closed store connection");
                break;
            }
            Ok(_) => {
                // Ignore binary/ping/pong frames.
            }
            Err(e) => {
                tracing::warn!(err = %e, "gateway read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    tracing::info!("store reader task exiting");
}
