//! In-process store used by tests and offline runs.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use studiobot_proto::member::Member;
use studiobot_proto::task::{Task, TaskStatus};

use super::{StoreError, TaskStore};

/// A [`TaskStore`] holding collections in memory.
///
/// `set_unreachable(true)` makes every operation fail with
/// [`StoreError::Unreachable`], for exercising the skip-cycle paths.
#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<Vec<Task>>,
    members: RwLock<Vec<Member>>,
    unreachable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with tasks and members.
    #[must_use]
    pub fn with_data(tasks: Vec<Task>, members: Vec<Member>) -> Self {
        Self {
            tasks: RwLock::new(tasks),
            members: RwLock::new(members),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Replaces the task collection.
    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.write() = tasks;
    }

    /// Replaces the member collection.
    pub fn set_members(&self, members: Vec<Member>) {
        *self.members.write() = members;
    }

    /// Toggles simulated unreachability.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(StoreError::Unreachable("simulated outage".to_string()));
        }
        Ok(())
    }
}

impl TaskStore for MemoryStore {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.check_reachable()?;
        Ok(self.tasks.read().clone())
    }

    async fn fetch_members(&self) -> Result<Vec<Member>, StoreError> {
        self.check_reachable()?;
        Ok(self.members.read().clone())
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        self.check_reachable()?;
        let mut tasks = self.tasks.write();
        for task in tasks.iter_mut() {
            if task.id == task_id {
                task.status = status;
            }
        }
        Ok(())
    }

    async fn set_checklist_done(&self, task_id: &str, index: usize) -> Result<(), StoreError> {
        self.check_reachable()?;
        let mut tasks = self.tasks.write();
        for task in tasks.iter_mut() {
            if task.id == task_id
                && let Some(item) = task.checklist.get_mut(index)
            {
                item.done = true;
            }
        }
        Ok(())
    }
}
