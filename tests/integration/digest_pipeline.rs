//! Digest building against a live gateway store, and delivery through the
//! notifier.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use studiobot::notifier::{self, LinkState, NotifierConfig};
use studiobot::scheduler;
use studiobot::store::accessor::StoreAccessor;
use studiobot::store::remote::GatewayStore;
use studiobot_gateway::gateway::{start_server_with_state, GatewayState};
use studiobot_gateway::store::DocumentStore;
use studiobot_proto::gateway::{self, GatewayMessage};

async fn start_gateway(seed: serde_json::Value) -> (String, Arc<GatewayState>) {
    let state = Arc::new(GatewayState::with_store(DocumentStore::with_root(seed)));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (format!("ws://{addr}/ws"), state)
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn daily_digest_groups_by_member_and_flags_overdue() {
    let (url, _state) = start_gateway(json!({
        "tasks": {
            "t1": {"title": "Logo", "status": "todo",
                   "assignedTo": ["Mario"], "dueDate": "2026-09-01"},
            "t2": {"title": "Sito", "status": "inprogress",
                   "assignedTo": ["Lucia"], "dueDate": "2026-09-01"},
            "t3": {"title": "Brochure", "status": "todo",
                   "assignedTo": ["Mario"], "dueDate": "2026-08-28"},
            "t4": {"title": "Archivio", "status": "done",
                   "assignedTo": ["Mario"], "dueDate": "2026-09-01"},
        }
    }))
    .await;

    let store = GatewayStore::connect(&url, "digest-bot").await.unwrap();
    let accessor = StoreAccessor::new(store);

    let text = scheduler::build_daily_digest(&accessor, date("2026-09-01"))
        .await
        .unwrap();

    assert!(text.contains("*Lucia*"));
    assert!(text.contains("*Mario*"));
    assert!(text.contains("Logo"));
    assert!(text.contains("Sito"));
    // Overdue tail with the day count.
    assert!(text.contains("Brochure"));
    assert!(text.contains("4 giorni di ritardo"));
    // Done tasks never show up.
    assert!(!text.contains("Archivio"));
}

#[tokio::test]
async fn empty_digest_is_affirmative() {
    let (url, _state) = start_gateway(json!({"tasks": {}})).await;

    let store = GatewayStore::connect(&url, "digest-empty").await.unwrap();
    let accessor = StoreAccessor::new(store);

    let text = scheduler::build_daily_digest(&accessor, date("2026-09-01"))
        .await
        .unwrap();
    assert!(!text.is_empty());
    assert!(text.contains("Nessun task"));
}

#[tokio::test]
async fn digest_lands_on_the_configured_channel() {
    let (url, _state) = start_gateway(json!({
        "tasks": {"t1": {"title": "Logo", "status": "todo",
                         "assignedTo": ["Mario"], "dueDate": "2026-09-01"}}
    }))
    .await;

    // Observer that should receive the digest.
    let (mut observer, _) = connect_async(&url).await.unwrap();
    let login = gateway::encode(&GatewayMessage::Login {
        client_id: "digest-observer".to_string(),
    })
    .unwrap();
    observer.send(Message::Text(login.into())).await.unwrap();
    // Consume the LoginOk ack.
    observer.next().await.unwrap().unwrap();

    let (notify, _inbound, _fatal) = notifier::spawn(NotifierConfig {
        gateway_url: url.clone(),
        client_id: "digest-sender".to_string(),
        channel: Some("studio".to_string()),
        reconnect_delay: Duration::from_millis(100),
    });
    for _ in 0..100 {
        if notify.state() == LinkState::Ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let store = GatewayStore::connect(&url, "digest-sender-store").await.unwrap();
    let accessor = StoreAccessor::new(store);
    let text = scheduler::build_daily_digest(&accessor, date("2026-09-01"))
        .await
        .unwrap();
    notify.send(&text);

    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), observer.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(data) = frame {
            if let GatewayMessage::ChatMessage { channel, text, .. } =
                gateway::decode(data.as_str()).unwrap()
            {
                assert_eq!(channel, "studio");
                assert!(text.contains("Mario"));
                return;
            }
        }
    }
}
