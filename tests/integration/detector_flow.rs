//! End-to-end flow: store change -> snapshot push -> detector -> formatter
//! -> notifier -> chat delivery.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use studiobot::bot::spawn_snapshot_loop;
use studiobot::notifier::{self, LinkState, NotifierConfig};
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

async fn next_chat_text(ws: &mut WsClient) -> String {
    loop {
        if let GatewayMessage::ChatMessage { text, .. } = next_message(ws).await {
            return text;
        }
    }
}

async fn wait_ready(handle: &studiobot::notifier::NotifierHandle) {
    for _ in 0..100 {
        if handle.state() == LinkState::Ready {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("notifier never became ready");
}

#[tokio::test]
async fn status_change_reaches_the_channel_but_baseline_stays_silent() {
    let (url, state) = start_gateway(json!({
        "tasks": {"t1": {"title": "Logo", "status": "todo", "assignedTo": ["Mario"]}}
    }))
    .await;

    let mut observer = connect_and_login(&url, "observer").await;

    let (notify, _inbound, _fatal) = notifier::spawn(NotifierConfig {
        gateway_url: url.clone(),
        client_id: "bot".to_string(),
        channel: Some("studio".to_string()),
        reconnect_delay: Duration::from_millis(100),
    });
    wait_ready(&notify).await;

    let store = GatewayStore::connect(&url, "bot-store").await.unwrap();
    let snapshots = store.subscribe_tasks().await.unwrap();
    spawn_snapshot_loop(snapshots, notify.clone());

    // Give the loop time to consume the initial push as its baseline.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Pre-existing state never gets announced.
    state
        .store
        .write("tasks/t1/status", json!("done"))
        .await
        .unwrap();
    state.notify_watchers("tasks").await;

    let text = next_chat_text(&mut observer).await;
    assert!(text.contains("completato"), "unexpected message: {text}");
    assert!(text.contains("Logo"));
}

#[tokio::test]
async fn new_task_announced_only_when_assigned() {
    let (url, state) = start_gateway(json!({"tasks": {}})).await;

    let mut observer = connect_and_login(&url, "observer2").await;

    let (notify, _inbound, _fatal) = notifier::spawn(NotifierConfig {
        gateway_url: url.clone(),
        client_id: "bot2".to_string(),
        channel: Some("studio".to_string()),
        reconnect_delay: Duration::from_millis(100),
    });
    wait_ready(&notify).await;

    let store = GatewayStore::connect(&url, "bot2-store").await.unwrap();
    let snapshots = store.subscribe_tasks().await.unwrap();
    spawn_snapshot_loop(snapshots, notify.clone());
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Unassigned task: silent.
    state
        .store
        .write("tasks/t1", json!({"title": "Bozza", "status": "todo"}))
        .await
        .unwrap();
    state.notify_watchers("tasks").await;

    // Assigned task: announced.
    state
        .store
        .write(
            "tasks/t2",
            json!({"title": "Sito", "status": "todo", "assignedTo": ["Lucia"]}),
        )
        .await
        .unwrap();
    state.notify_watchers("tasks").await;

    let text = next_chat_text(&mut observer).await;
    assert!(text.contains("Sito"), "unexpected message: {text}");
    assert!(!text.contains("Bozza"));
}
