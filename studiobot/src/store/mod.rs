//! Store boundary: the task/member collections the bot reads and updates.
//!
//! The backing store is a keyed document tree reached through the gateway
//! ([`remote::GatewayStore`]); [`memory::MemoryStore`] provides the same
//! contract in-process for tests. [`accessor::StoreAccessor`] layers the
//! read projections (due today, overdue, in range) on top of either.

pub mod accessor;
pub mod memory;
pub mod remote;

use studiobot_proto::member::Member;
use studiobot_proto::task::{Task, TaskStatus};

/// Errors surfaced by store operations.
///
/// All of these are treated as transient by the callers driving timed
/// cycles: log, skip the cycle, wait for the next firing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// A request did not complete in time.
    #[error("store request timed out")]
    Timeout,

    /// The store connection is down.
    #[error("store connection closed")]
    ConnectionClosed,

    /// The store returned data that does not normalize into the model.
    #[error("malformed store data: {0}")]
    Malformed(#[from] studiobot_proto::task::ModelError),

    /// A wire frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] studiobot_proto::gateway::CodecError),
}

/// Read and update operations against the shared task collection.
///
/// Reads return normalized, ordered sequences; the array-vs-map duality of
/// the underlying representation never crosses this boundary.
pub trait TaskStore: Send + Sync {
    /// Fetches the full task collection.
    fn fetch_tasks(&self) -> impl Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Fetches the member collection.
    fn fetch_members(&self) -> impl Future<Output = Result<Vec<Member>, StoreError>> + Send;

    /// Sets the status of a task.
    fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Marks one checklist item of a task as done.
    fn set_checklist_done(
        &self,
        task_id: &str,
        index: usize,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: TaskStore> TaskStore for std::sync::Arc<S> {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError> {
        (**self).fetch_tasks().await
    }

    async fn fetch_members(&self) -> Result<Vec<Member>, StoreError> {
        (**self).fetch_members().await
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        (**self).update_status(task_id, status).await
    }

    async fn set_checklist_done(&self, task_id: &str, index: usize) -> Result<(), StoreError> {
        (**self).set_checklist_done(task_id, index).await
    }
}
