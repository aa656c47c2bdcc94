//! Gateway core: shared state, WebSocket handler, session registry, store
//! watch notifications, and chat delivery.
//!
//! The gateway accepts WebSocket connections, registers each session by its
//! client id, and serves two surfaces over the same socket: the keyed
//! document store (fetch / subscribe / update, with full-value pushes on
//! every change) and the chat channel (send / deliver). A duplicate login
//! with an already-registered client id invalidates the previous session
//! with a terminal `LoggedOut` frame.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};

use studiobot_proto::gateway::{self, GatewayMessage};

use crate::store::DocumentStore;

/// Default cap on a single incoming WebSocket message, in bytes.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Shared gateway state holding the session registry, watchers, and store.
pub struct GatewayState {
    /// Maps client id to a channel sender for delivering WebSocket frames.
    sessions: RwLock<HashMap<String, mpsc::UnboundedSender<Message>>>,
    /// Maps a watched collection path to the client ids subscribed to it.
    watchers: RwLock<HashMap<String, Vec<String>>>,
    /// The JSON document tree.
    pub store: DocumentStore,
    /// Cap on a single incoming WebSocket message. A frame over the limit
    /// fails the read and ends the session.
    pub max_payload_bytes: usize,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayState {
    /// Creates gateway state with an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(DocumentStore::new())
    }

    /// Creates gateway state around a pre-seeded document store.
    #[must_use]
    pub fn with_store(store: DocumentStore) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            watchers: RwLock::new(HashMap::new()),
            store,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    /// Registers a session, returning the previous sender for the same
    /// client id if one existed.
    pub async fn register(
        &self,
        client_id: &str,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Option<mpsc::UnboundedSender<Message>> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(client_id.to_string(), sender)
    }

    /// Removes a session and all of its watch registrations.
    pub async fn unregister(&self, client_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(client_id);
        drop(sessions);
        let mut watchers = self.watchers.write().await;
        for ids in watchers.values_mut() {
            ids.retain(|id| id != client_id);
        }
    }

    /// Removes a session only while `sender` is still its registered
    /// channel. A replaced session tearing down must not unregister the
    /// session that replaced it.
    pub async fn unregister_session(
        &self,
        client_id: &str,
        sender: &mpsc::UnboundedSender<Message>,
    ) {
        let mut sessions = self.sessions.write().await;
        let still_ours = sessions
            .get(client_id)
            .is_some_and(|current| current.same_channel(sender));
        if !still_ours {
            return;
        }
        sessions.remove(client_id);
        drop(sessions);
        let mut watchers = self.watchers.write().await;
        for ids in watchers.values_mut() {
            ids.retain(|id| id != client_id);
        }
    }

    /// Returns a clone of the sender for the given client, if registered.
    pub async fn get_sender(&self, client_id: &str) -> Option<mpsc::UnboundedSender<Message>> {
        let sessions = self.sessions.read().await;
        sessions.get(client_id).cloned()
    }

    /// Adds a watch registration for a collection path.
    pub async fn add_watcher(&self, path: &str, client_id: &str) {
        let mut watchers = self.watchers.write().await;
        let ids = watchers.entry(path.to_string()).or_default();
        if !ids.iter().any(|id| id == client_id) {
            ids.push(client_id.to_string());
        }
    }

    /// Pushes the full current value of `path` to every watcher.
    pub async fn notify_watchers(&self, path: &str) {
        let value = self.store.read(path).await;
        let msg = GatewayMessage::ValueChanged {
            path: path.to_string(),
            value,
        };
        let ids = {
            let watchers = self.watchers.read().await;
            watchers.get(path).cloned().unwrap_or_default()
        };
        for client_id in ids {
            send_to_session(self, &client_id, &msg).await;
        }
    }

    /// Terminates a session: sends a `LoggedOut` frame followed by a close
    /// frame. The client must treat this as unrecoverable.
    pub async fn logout(&self, client_id: &str, reason: &str) {
        let msg = GatewayMessage::LoggedOut {
            reason: reason.to_string(),
        };
        if let Some(sender) = self.get_sender(client_id).await {
            if let Ok(text) = gateway::encode(&msg) {
                let _ = sender.send(Message::Text(text.into()));
            }
            let _ = sender.send(Message::Close(None));
        }
        self.unregister(client_id).await;
    }
}

/// Handles an upgraded WebSocket connection for a single session.
///
/// Lifecycle:
/// 1. Wait for a `Login` frame.
/// 2. Register the session (terminating a previous one with the same id)
///    and send `LoginOk` back.
/// 3. Enter the frame loop: store requests, chat sends.
/// 4. On disconnect, unregister the session and drop its watches.
pub async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some(client_id) = wait_for_login(&mut ws_receiver).await else {
        tracing::warn!("connection closed before login");
        return;
    };

    tracing::info!(client_id = %client_id, "session logging in");

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // A duplicate login invalidates the old session terminally.
    if let Some(old_sender) = state.register(&client_id, tx.clone()).await {
        tracing::info!(client_id = %client_id, "terminating previous session (duplicate login)");
        let logged_out = GatewayMessage::LoggedOut {
            reason: "session replaced by a new login".to_string(),
        };
        if let Ok(text) = gateway::encode(&logged_out) {
            let _ = old_sender.send(Message::Text(text.into()));
        }
        let _ = old_sender.send(Message::Close(None));
    }

    let ack = GatewayMessage::LoginOk {
        client_id: client_id.clone(),
    };
    if let Err(e) = send_frame(&mut ws_sender, &ack).await {
        tracing::error!(client_id = %client_id, error = %e, "failed to send LoginOk");
        state.unregister_session(&client_id, &tx).await;
        return;
    }

    tracing::info!(client_id = %client_id, "session registered");

    // Writer task: forwards frames from the session channel to the socket.
    let writer_client_id = client_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(client_id = %writer_client_id, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Reader loop: process frames from this session.
    let reader_client_id = client_id.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_frame(&reader_client_id, text.as_str(), &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(client_id = %reader_client_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.unregister_session(&client_id, &tx).await;
    tracing::info!(client_id = %client_id, "session disconnected and unregistered");
}

/// Waits for the first frame, expecting a `Login` message.
async fn wait_for_login(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<String> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match gateway::decode(text.as_str()) {
                Ok(GatewayMessage::Login { client_id }) => {
                    if client_id.is_empty() {
                        tracing::warn!("received Login with empty client_id");
                        return None;
                    }
                    return Some(client_id);
                }
                Ok(other) => {
                    tracing::warn!(msg = ?other, "expected Login, got different message");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode login frame");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip non-text frames (ping/pong) during login.
            }
        }
    }
    None
}

/// Handles one decoded text frame from a registered session.
async fn handle_text_frame(client_id: &str, text: &str, state: &Arc<GatewayState>) {
    let msg = match gateway::decode(text) {
        Ok(m) => m,
        Err(e) => {
            // Malformed frame: log and skip, never disconnect.
            tracing::warn!(client_id = %client_id, error = %e, "malformed frame, skipping");
            return;
        }
    };

    match msg {
        GatewayMessage::Fetch { path } => {
            let value = state.store.read(&path).await;
            let response = GatewayMessage::FetchResult { path, value };
            send_to_session(state, client_id, &response).await;
        }
        GatewayMessage::Subscribe { path } => {
            state.add_watcher(&path, client_id).await;
            tracing::debug!(client_id = %client_id, path = %path, "watch registered");
            // Push the current full value immediately.
            let value = state.store.read(&path).await;
            let initial = GatewayMessage::ValueChanged { path, value };
            send_to_session(state, client_id, &initial).await;
        }
        GatewayMessage::Update { path, value } => match state.store.write(&path, value).await {
            Ok(collection) => {
                tracing::debug!(client_id = %client_id, path = %path, "store updated");
                state.notify_watchers(&collection).await;
            }
            Err(e) => {
                tracing::warn!(client_id = %client_id, path = %path, error = %e, "store write failed");
                let err = GatewayMessage::Error {
                    reason: e.to_string(),
                };
                send_to_session(state, client_id, &err).await;
            }
        },
        GatewayMessage::ChatSend { channel, text } => {
            deliver_chat(state, client_id, &channel, text).await;
        }
        GatewayMessage::Login { client_id: new_id } => {
            tracing::warn!(
                client_id = %client_id,
                new_id = %new_id,
                "received duplicate Login on an established session"
            );
        }
        other => {
            tracing::warn!(client_id = %client_id, msg = ?other, "unexpected frame from client");
        }
    }
}

/// Delivers a chat message to every other logged-in session.
///
/// The gateway does not model channel membership: every session shares the
/// studio's group channel, and the channel id travels with the frame for the
/// client to filter on.
async fn deliver_chat(state: &Arc<GatewayState>, sender_id: &str, channel: &str, text: String) {
    let delivery = GatewayMessage::ChatMessage {
        channel: channel.to_string(),
        sender: sender_id.to_string(),
        text,
    };
    let recipients: Vec<String> = {
        let sessions = state.sessions.read().await;
        sessions.keys().filter(|id| *id != sender_id).cloned().collect()
    };
    tracing::debug!(
        sender = %sender_id,
        channel = %channel,
        recipients = recipients.len(),
        "delivering chat message"
    );
    for client_id in recipients {
        send_to_session(state, &client_id, &delivery).await;
    }
}

/// Sends a gateway message to a registered session via its channel.
async fn send_to_session(state: &GatewayState, client_id: &str, msg: &GatewayMessage) {
    if let Some(sender) = state.get_sender(client_id).await
        && let Ok(text) = gateway::encode(msg)
    {
        let _ = sender.send(Message::Text(text.into()));
    }
}

/// Encodes and sends a gateway message directly on a WebSocket sender.
async fn send_frame(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    msg: &GatewayMessage,
) -> Result<(), String> {
    let text = gateway::encode(msg).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Starts the gateway on the given address and returns the bound address and
/// a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(GatewayState::new())).await
}

/// Starts the gateway with a pre-configured [`GatewayState`].
///
/// Use [`GatewayState::with_store`] to seed the document tree from a file
/// or a test fixture.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<GatewayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "gateway server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<GatewayState>>,
) -> impl axum::response::IntoResponse {
    ws.max_message_size(state.max_payload_bytes)
        .max_frame_size(state.max_payload_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}
