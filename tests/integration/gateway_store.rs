//! GatewayStore round trips against an in-process gateway.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use studiobot::store::remote::GatewayStore;
use studiobot::store::TaskStore;
use studiobot_gateway::gateway::{start_server_with_state, GatewayState};
use studiobot_gateway::store::DocumentStore;
use studiobot_proto::task::TaskStatus;

async fn start_gateway(seed: serde_json::Value) -> (String, Arc<GatewayState>) {
    let state = Arc::new(GatewayState::with_store(DocumentStore::with_root(seed)));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (format!("ws://{addr}/ws"), state)
}

#[tokio::test]
async fn fetch_tasks_normalizes_map_form() {
    let (url, _state) = start_gateway(json!({
        "tasks": {
            "t2": {"title": "Sito", "status": "inprogress"},
            "t1": {"title": "Logo", "status": "todo"},
        }
    }))
    .await;

    let store = GatewayStore::connect(&url, "test-map").await.unwrap();
    let tasks = store.fetch_tasks().await.unwrap();

    assert_eq!(tasks.len(), 2);
    // Map form comes back key-ordered with keys injected as ids.
    assert_eq!(tasks[0].id, "t1");
    assert_eq!(tasks[1].id, "t2");
    assert_eq!(tasks[0].title, "Logo");
}

#[tokio::test]
async fn fetch_tasks_normalizes_array_form_with_null_slots() {
    let (url, _state) = start_gateway(json!({
        "tasks": [
            null,
            {"id": "t1", "title": "Logo", "status": "todo"},
            null,
        ]
    }))
    .await;

    let store = GatewayStore::connect(&url, "test-array").await.unwrap();
    let tasks = store.fetch_tasks().await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "t1");
}

#[tokio::test]
async fn fetch_members() {
    let (url, _state) = start_gateway(json!({
        "members": {
            "m1": {"name": "Mario"},
            "m2": {"name": "Lucia"},
        }
    }))
    .await;

    let store = GatewayStore::connect(&url, "test-members").await.unwrap();
    let members = store.fetch_members().await.unwrap();

    assert_eq!(members.len(), 2);
    assert_eq!(members[0].name, "Mario");
}

#[tokio::test]
async fn missing_collection_fetches_empty() {
    let (url, _state) = start_gateway(json!({})).await;
    let store = GatewayStore::connect(&url, "test-empty").await.unwrap();
    assert!(store.fetch_tasks().await.unwrap().is_empty());
    assert!(store.fetch_members().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_status_is_visible_on_next_fetch() {
    let (url, _state) = start_gateway(json!({
        "tasks": {"t1": {"title": "Logo", "status": "todo"}}
    }))
    .await;

    let store = GatewayStore::connect(&url, "test-update").await.unwrap();
    store.update_status("t1", TaskStatus::Done).await.unwrap();

    // Frames are handled in order per connection, so the fetch that follows
    // the update sees the written value.
    let tasks = store.fetch_tasks().await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Done);
}

#[tokio::test]
async fn set_checklist_done_ticks_the_item() {
    let (url, _state) = start_gateway(json!({
        "tasks": {"t1": {
            "title": "Sito",
            "status": "todo",
            "checklist": [
                {"text": "bozza", "done": false},
                {"text": "deploy", "done": false},
            ],
        }}
    }))
    .await;

    let store = GatewayStore::connect(&url, "test-checklist").await.unwrap();
    store.set_checklist_done("t1", 0).await.unwrap();

    let tasks = store.fetch_tasks().await.unwrap();
    assert!(tasks[0].checklist[0].done);
    assert!(!tasks[0].checklist[1].done);
}

#[tokio::test]
async fn subscription_pushes_initial_value_then_changes() {
    let (url, state) = start_gateway(json!({
        "tasks": {"t1": {"title": "Logo", "status": "todo"}}
    }))
    .await;

    let store = GatewayStore::connect(&url, "test-sub").await.unwrap();
    let mut rx = store.subscribe_tasks().await.unwrap();

    // Immediate push of the current full value.
    let initial = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(initial["t1"]["status"], "todo");

    // A change pushes the full value again, never a delta.
    state
        .store
        .write("tasks/t1/status", json!("done"))
        .await
        .unwrap();
    state.notify_watchers("tasks").await;

    let changed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(changed["t1"]["status"], "done");
    assert_eq!(changed["t1"]["title"], "Logo");
}

#[tokio::test]
async fn logout_marks_the_connection_dead() {
    let (url, state) = start_gateway(json!({"tasks": {}})).await;

    let store = GatewayStore::connect(&url, "test-liveness").await.unwrap();
    assert!(store.is_connected());

    state.logout("test-liveness", "credentials revoked").await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.is_connected() {
        assert!(tokio::time::Instant::now() < deadline, "connection never marked dead");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn connect_to_dead_gateway_fails() {
    let result = GatewayStore::connect("ws://127.0.0.1:1/ws", "test-dead").await;
    assert!(result.is_err());
}
