//! Wiring: connects the store subscription, the change detector, the
//! scheduler jobs, the command handler, and the notifier into the running
//! bot.
//!
//! Two gateway sessions are held: `<client_id>-store` for the document
//! subscription and `<client_id>` for chat. The store session reconnects on
//! its own schedule without disturbing the detector baseline; the chat
//! session's terminal logout ends the process.

use std::sync::Arc;

use tokio::sync::mpsc;

use studiobot_proto::task;

use crate::commands::CommandHandler;
use crate::config::BotConfig;
use crate::detector::ChangeDetector;
use crate::format;
use crate::notifier::{self, InboundMessage, NotifierConfig, NotifierHandle};
use crate::scheduler::{self, Job};
use crate::store::accessor::StoreAccessor;
use crate::store::remote::GatewayStore;
use crate::store::{StoreError, TaskStore};

/// Fatal conditions that end the bot.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// The chat session was terminally logged out by the gateway.
    #[error("chat session logged out: {0}")]
    LoggedOut(String),

    /// The notifier task ended without reporting a logout.
    #[error("notifier task ended unexpectedly")]
    NotifierGone,
}

/// Store handle that survives reconnects.
///
/// The subscription supervisor swaps the live [`GatewayStore`] in and out;
/// while no connection is up, every operation fails with
/// [`StoreError::ConnectionClosed`] and callers skip their cycle.
#[derive(Default)]
pub struct SharedStore {
    inner: tokio::sync::RwLock<Option<Arc<GatewayStore>>>,
}

impl SharedStore {
    /// Installs the live connection.
    pub async fn set(&self, store: Arc<GatewayStore>) {
        *self.inner.write().await = Some(store);
    }

    /// Drops the live connection.
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    async fn current(&self) -> Result<Arc<GatewayStore>, StoreError> {
        self.inner
            .read()
            .await
            .clone()
            .ok_or(StoreError::ConnectionClosed)
    }
}

impl TaskStore for SharedStore {
    async fn fetch_tasks(&self) -> Result<Vec<task::Task>, StoreError> {
        self.current().await?.fetch_tasks().await
    }

    async fn fetch_members(
        &self,
    ) -> Result<Vec<studiobot_proto::member::Member>, StoreError> {
        self.current().await?.fetch_members().await
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: task::TaskStatus,
    ) -> Result<(), StoreError> {
        self.current().await?.update_status(task_id, status).await
    }

    async fn set_checklist_done(&self, task_id: &str, index: usize) -> Result<(), StoreError> {
        self.current()
            .await?
            .set_checklist_done(task_id, index)
            .await
    }
}

/// Normalizes one raw snapshot and feeds it to the detector.
///
/// A snapshot that fails normalization is logged and discarded; the
/// baseline is untouched and no events fire.
pub fn apply_snapshot(
    detector: &mut ChangeDetector,
    raw: &serde_json::Value,
) -> Vec<studiobot_proto::event::NotificationEvent> {
    match task::normalize(raw) {
        Ok(tasks) => detector.observe(&tasks),
        Err(e) => {
            tracing::warn!(error = %e, "malformed snapshot discarded, baseline kept");
            Vec::new()
        }
    }
}

/// Starts the single consumer task that turns snapshots into notifications.
pub fn spawn_snapshot_loop(
    mut snapshots: mpsc::Receiver<serde_json::Value>,
    notifier: NotifierHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut detector = ChangeDetector::new();
        while let Some(raw) = snapshots.recv().await {
            for event in apply_snapshot(&mut detector, &raw) {
                tracing::info!(task_id = %event.task_id(), "notifying change");
                notifier.send(&format::event_message(&event));
            }
        }
        tracing::info!("snapshot loop ending");
    })
}

/// Starts the task answering inbound chat commands.
pub fn spawn_command_loop<S: TaskStore + 'static>(
    handler: CommandHandler<S>,
    mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
    notifier: NotifierHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            if let Some(reply) = handler.handle(&message.text).await {
                notifier.reply(&message.channel, &reply);
            }
        }
        tracing::info!("command loop ending");
    })
}

/// Supervises the store session: connect, subscribe, forward snapshots,
/// reconnect with a fixed delay on loss.
async fn store_supervisor(
    config: BotConfig,
    shared: Arc<SharedStore>,
    snapshot_tx: mpsc::Sender<serde_json::Value>,
) {
    let store_client_id = format!("{}-store", config.client_id);
    loop {
        match GatewayStore::connect(&config.gateway_url, &store_client_id).await {
            Ok(store) => {
                let store = Arc::new(store);
                shared.set(Arc::clone(&store)).await;
                match store.subscribe_tasks().await {
                    Ok(mut rx) => {
                        tracing::info!("task subscription active");
                        while let Some(raw) = rx.recv().await {
                            if snapshot_tx.send(raw).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "task subscription failed");
                    }
                }
                shared.clear().await;
                tracing::warn!(
                    still_connected = store.is_connected(),
                    delay = ?config.reconnect_delay,
                    "store link lost, reconnecting"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, delay = ?config.reconnect_delay, "store connect failed, retrying");
            }
        }
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

/// Runs the bot until a fatal condition.
///
/// # Errors
///
/// Returns [`BotError::LoggedOut`] when the chat session is terminally
/// logged out; the caller is expected to exit.
pub async fn run(config: BotConfig) -> Result<(), BotError> {
    let (notifier, inbound_rx, fatal_rx) = notifier::spawn(NotifierConfig {
        gateway_url: config.gateway_url.clone(),
        client_id: config.client_id.clone(),
        channel: config.channel.clone(),
        reconnect_delay: config.reconnect_delay,
    });

    let shared = Arc::new(SharedStore::default());
    let (snapshot_tx, snapshot_rx) = mpsc::channel(16);

    tokio::spawn(store_supervisor(
        config.clone(),
        Arc::clone(&shared),
        snapshot_tx,
    ));
    spawn_snapshot_loop(snapshot_rx, notifier.clone());

    let handler = CommandHandler::new(
        StoreAccessor::new(Arc::clone(&shared)),
        config.timezone,
    );
    spawn_command_loop(handler, inbound_rx, notifier.clone());

    let accessor = Arc::new(StoreAccessor::new(shared));
    for (job, hour, minute) in [
        (Job::DailyDigest, config.digest_hour, config.digest_minute),
        (
            Job::DeadlineWarning,
            config.warning_hour,
            config.warning_minute,
        ),
        (Job::WeeklyDigest, config.digest_hour, config.digest_minute),
        (Job::MonthlyDigest, config.digest_hour, config.digest_minute),
    ] {
        tokio::spawn(scheduler::run_job(
            job,
            Arc::clone(&accessor),
            notifier.clone(),
            config.timezone,
            hour,
            minute,
        ));
    }

    match fatal_rx.await {
        Ok(reason) => Err(BotError::LoggedOut(reason)),
        Err(_) => Err(BotError::NotifierGone),
    }
}
