//! Notification events produced by the snapshot diff.

use crate::task::{Task, TaskStatus};

/// A change worth announcing, derived by comparing two task snapshots.
///
/// Deletions are deliberately not represented: a task present in the old
/// snapshot but absent from the new one produces nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A task appeared that was not in the previous snapshot. Only emitted
    /// when the task has at least one assignee.
    NewTask(Task),
    /// A task's status changed between snapshots.
    StatusChanged {
        /// The task, as seen in the new snapshot.
        task: Task,
        /// Status in the previous snapshot.
        old: TaskStatus,
        /// Status in the new snapshot.
        new: TaskStatus,
    },
    /// Members were added to a task's assignee list.
    NewAssignment {
        /// The task, as seen in the new snapshot.
        task: Task,
        /// Newly added members, in new-list order.
        added: Vec<String>,
    },
}

impl NotificationEvent {
    /// The id of the task this event concerns.
    #[must_use]
    pub fn task_id(&self) -> &str {
        match self {
            Self::NewTask(task)
            | Self::StatusChanged { task, .. }
            | Self::NewAssignment { task, .. } => &task.id,
        }
    }
}
