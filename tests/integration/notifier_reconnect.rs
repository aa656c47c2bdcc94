//! Notifier link behavior: drops while not ready, reconnect after a lost
//! session, terminal logout.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use studiobot::notifier::{self, LinkState, NotifierConfig, NotifierHandle};
use studiobot_gateway::gateway::{start_server_with_state, GatewayState};
use studiobot_gateway::store::DocumentStore;

async fn start_gateway() -> (String, Arc<GatewayState>) {
    let state = Arc::new(GatewayState::with_store(DocumentStore::with_root(json!({}))));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (format!("ws://{addr}/ws"), state)
}

fn config(url: &str, client_id: &str) -> NotifierConfig {
    NotifierConfig {
        gateway_url: url.to_string(),
        client_id: client_id.to_string(),
        channel: Some("studio".to_string()),
        reconnect_delay: Duration::from_millis(50),
    }
}

async fn wait_for_state(handle: &NotifierHandle, wanted: LinkState) {
    for _ in 0..200 {
        if handle.state() == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("notifier never reached {wanted:?}, stuck at {:?}", handle.state());
}

#[tokio::test]
async fn unreachable_gateway_never_becomes_ready() {
    let (handle, _inbound, _fatal) =
        notifier::spawn(config("ws://127.0.0.1:1/ws", "bot-unreachable"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_ne!(handle.state(), LinkState::Ready);

    // Sending while down is a silent best-effort drop, never a panic.
    handle.send("messaggio perso");
}

#[tokio::test]
async fn reconnects_after_session_drop() {
    let (url, state) = start_gateway().await;
    let (handle, _inbound, _fatal) = notifier::spawn(config(&url, "bot-drop"));
    wait_for_state(&handle, LinkState::Ready).await;

    // Tearing down the server-side session closes the socket without a
    // LoggedOut frame; the notifier must come back on its own.
    state.unregister("bot-drop").await;
    for _ in 0..200 {
        if handle.state() != LinkState::Ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_ne!(handle.state(), LinkState::Terminated);
    wait_for_state(&handle, LinkState::Ready).await;
}

#[tokio::test]
async fn logged_out_is_terminal() {
    let (url, state) = start_gateway().await;
    let (handle, _inbound, fatal) = notifier::spawn(config(&url, "bot-kicked"));
    wait_for_state(&handle, LinkState::Ready).await;

    state.logout("bot-kicked", "session replaced").await;

    let reason = tokio::time::timeout(Duration::from_secs(5), fatal)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, "session replaced");
    assert_eq!(handle.state(), LinkState::Terminated);

    // No reconnect follows a terminal logout.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.state(), LinkState::Terminated);
}

#[tokio::test]
async fn duplicate_login_terminates_the_old_session() {
    let (url, _state) = start_gateway().await;
    let (first, _inbound1, fatal1) = notifier::spawn(config(&url, "bot-dup"));
    wait_for_state(&first, LinkState::Ready).await;

    let (second, _inbound2, _fatal2) = notifier::spawn(config(&url, "bot-dup"));
    wait_for_state(&second, LinkState::Ready).await;

    let reason = tokio::time::timeout(Duration::from_secs(5), fatal1)
        .await
        .unwrap()
        .unwrap();
    assert!(!reason.is_empty());
    assert_eq!(first.state(), LinkState::Terminated);
}
