//! Gateway wire protocol.
//!
//! The bot talks to the gateway over WebSocket text frames carrying one JSON
//! object per frame, tagged by `type`. The same envelope serves both halves
//! of the gateway: the keyed document store (subscribe / fetch / update with
//! full-value change pushes, never deltas) and the chat channel (login, send,
//! inbound messages, terminal logout).

use serde::{Deserialize, Serialize};

/// Errors produced by the frame codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame could not be serialized to JSON.
    #[error("gateway frame encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Frame could not be parsed as a known message.
    #[error("gateway frame decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A single frame of the gateway protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    // --- session ---
    /// Client identifies itself. First frame on every connection.
    Login {
        /// Stable client identity. A second login with the same id
        /// invalidates the previous session.
        client_id: String,
    },
    /// Server acknowledges a login.
    LoginOk {
        /// The registered client id, echoed back.
        client_id: String,
    },
    /// Terminal session invalidation. The server closes the socket after
    /// sending this; the client must not reconnect automatically.
    LoggedOut {
        /// Human-readable reason.
        reason: String,
    },
    /// Non-fatal server-side error for the previous request.
    Error {
        /// Human-readable reason.
        reason: String,
    },

    // --- document store ---
    /// One-shot read of a store path.
    Fetch {
        /// Slash-separated path, e.g. `tasks` or `tasks/t1/status`.
        path: String,
    },
    /// Response to a [`GatewayMessage::Fetch`].
    FetchResult {
        /// The requested path.
        path: String,
        /// Current value at the path (`null` when absent).
        value: serde_json::Value,
    },
    /// Register interest in a top-level collection. The server pushes the
    /// current full value immediately and again on every change.
    Subscribe {
        /// Collection path, e.g. `tasks`.
        path: String,
    },
    /// Full current value of a watched collection.
    ValueChanged {
        /// The watched path.
        path: String,
        /// The complete value, never a delta.
        value: serde_json::Value,
    },
    /// Write a value at a store path, creating intermediate objects.
    Update {
        /// Slash-separated path.
        path: String,
        /// New value for the path.
        value: serde_json::Value,
    },

    // --- chat ---
    /// Send a text message into a channel.
    ChatSend {
        /// Destination channel identifier.
        channel: String,
        /// Plain message text.
        text: String,
    },
    /// A text message delivered from a channel.
    ChatMessage {
        /// Originating channel identifier.
        channel: String,
        /// Client id of the sender.
        sender: String,
        /// Plain message text.
        text: String,
    },
}

/// Encodes a [`GatewayMessage`] as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode(msg: &GatewayMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::Encode)
}

/// Decodes a JSON text frame into a [`GatewayMessage`].
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the frame is not a known message.
pub fn decode(text: &str) -> Result<GatewayMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}
