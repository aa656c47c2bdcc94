//! Chat commands answered through a live gateway.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use studiobot::bot::spawn_command_loop;
use studiobot::commands::CommandHandler;
use studiobot::notifier::{self, LinkState, NotifierConfig};
use studiobot::store::accessor::StoreAccessor;
use studiobot::store::remote::GatewayStore;
use studiobot_gateway::gateway::{start_server_with_state, GatewayState};
use studiobot_gateway::store::DocumentStore;
use studiobot_proto::gateway::{self, GatewayMessage};

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn start_gateway(seed: serde_json::Value) -> (String, Arc<GatewayState>) {
    let state = Arc::new(GatewayState::with_store(DocumentStore::with_root(seed)));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (format!("ws://{addr}/ws"), state)
}

async fn connect_and_login(url: &str, client_id: &str) -> WsClient {
    let (mut ws, _) = connect_async(url).await.unwrap();
    let login = gateway::encode(&GatewayMessage::Login {
        client_id: client_id.to_string(),
    })
    .unwrap();
    ws.send(Message::Text(login.into())).await.unwrap();
    match next_message(&mut ws).await {
        GatewayMessage::LoginOk { .. } => ws,
        other => panic!("expected LoginOk, got {other:?}"),
    }
}

async fn next_message(ws: &mut WsClient) -> GatewayMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(data) = frame {
            return gateway::decode(data.as_str()).unwrap();
        }
    }
}

async fn say(ws: &mut WsClient, channel: &str, text: &str) {
    let frame = gateway::encode(&GatewayMessage::ChatSend {
        channel: channel.to_string(),
        text: text.to_string(),
    })
    .unwrap();
    ws.send(Message::Text(frame.into())).await.unwrap();
}

async fn next_chat_text(ws: &mut WsClient) -> String {
    loop {
        if let GatewayMessage::ChatMessage { text, .. } = next_message(ws).await {
            return text;
        }
    }
}

/// Spins up the bot side: notifier + command loop over a gateway store.
async fn start_bot(url: &str, client_id: &str) {
    let (notify, inbound, _fatal) = notifier::spawn(NotifierConfig {
        gateway_url: url.to_string(),
        client_id: client_id.to_string(),
        channel: Some("studio".to_string()),
        reconnect_delay: Duration::from_millis(100),
    });
    for _ in 0..100 {
        if notify.state() == LinkState::Ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(notify.state(), LinkState::Ready);

    let store = GatewayStore::connect(url, &format!("{client_id}-store"))
        .await
        .unwrap();
    let handler = CommandHandler::new(StoreAccessor::new(store), chrono_tz::Europe::Rome);
    spawn_command_loop(handler, inbound, notify);
}

#[tokio::test]
async fn lista_replies_into_the_originating_channel() {
    let (url, _state) = start_gateway(json!({
        "tasks": {
            "t1": {"title": "Logo cliente", "status": "todo"},
            "t2": {"title": "Sito web", "status": "done"},
        }
    }))
    .await;

    start_bot(&url, "cmdbot1").await;
    let mut user = connect_and_login(&url, "user1").await;

    say(&mut user, "studio", "!lista").await;
    let reply = next_chat_text(&mut user).await;
    assert!(reply.contains("Logo cliente"), "unexpected reply: {reply}");
    // Done tasks stay out of the open list.
    assert!(!reply.contains("Sito web"));
}

#[tokio::test]
async fn fatto_mutates_the_store_and_confirms() {
    let (url, state) = start_gateway(json!({
        "tasks": {"t1": {"title": "Logo cliente", "status": "todo"}}
    }))
    .await;

    start_bot(&url, "cmdbot2").await;
    let mut user = connect_and_login(&url, "user2").await;

    say(&mut user, "studio", "!fatto logo").await;
    let reply = next_chat_text(&mut user).await;
    assert!(reply.contains("completato"), "unexpected reply: {reply}");

    // The write is in the shared tree, not bot-local.
    for _ in 0..100 {
        if state.store.read("tasks/t1/status").await == json!("done") {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("status never written to the store");
}

#[tokio::test]
async fn ambiguous_fatto_does_not_mutate() {
    let (url, state) = start_gateway(json!({
        "tasks": {
            "t1": {"title": "Logo cliente A", "status": "todo"},
            "t2": {"title": "Logo cliente B", "status": "todo"},
        }
    }))
    .await;

    start_bot(&url, "cmdbot3").await;
    let mut user = connect_and_login(&url, "user3").await;

    say(&mut user, "studio", "!fatto logo").await;
    let reply = next_chat_text(&mut user).await;
    assert!(reply.contains("Quale intendi"), "unexpected reply: {reply}");

    assert_eq!(state.store.read("tasks/t1/status").await, json!("todo"));
    assert_eq!(state.store.read("tasks/t2/status").await, json!("todo"));
}

#[tokio::test]
async fn chatter_is_ignored_and_help_answered() {
    let (url, _state) = start_gateway(json!({"tasks": {}})).await;

    start_bot(&url, "cmdbot4").await;
    let mut user = connect_and_login(&url, "user4").await;

    // Plain chatter first: the first reply we get back must be for !help,
    // proving the chatter produced none.
    say(&mut user, "studio", "buongiorno a tutti").await;
    say(&mut user, "studio", "!help").await;

    let reply = next_chat_text(&mut user).await;
    assert!(reply.contains("Comandi disponibili"), "unexpected reply: {reply}");
}
