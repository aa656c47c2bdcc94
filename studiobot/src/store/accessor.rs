//! Read projections over the task collection.
//!
//! Every projection fetches a fresh snapshot and filters it in one pass.
//! Done tasks never appear in due-date views.

use chrono::NaiveDate;

use studiobot_proto::member::Member;
use studiobot_proto::task::{ChecklistItem, Task};

use super::{StoreError, TaskStore};

/// Bucket name used for tasks without any assignee.
pub const UNASSIGNED: &str = "Non assegnato";

/// Query layer over a [`TaskStore`].
pub struct StoreAccessor<S> {
    store: S,
}

impl<S: TaskStore> StoreAccessor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store, for mutations.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Open tasks due exactly on `date`.
    ///
    /// # Errors
    ///
    /// Propagates the store fetch failure.
    pub async fn tasks_due_on(&self, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        let tasks = self.store.fetch_tasks().await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.is_open() && t.due_date == Some(date))
            .collect())
    }

    /// Open tasks whose due date is strictly before `as_of`.
    ///
    /// # Errors
    ///
    /// Propagates the store fetch failure.
    pub async fn overdue_tasks(&self, as_of: NaiveDate) -> Result<Vec<Task>, StoreError> {
        let tasks = self.store.fetch_tasks().await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.is_open() && t.due_date.is_some_and(|d| d < as_of))
            .collect())
    }

    /// Open tasks due within `[from, to]`, inclusive on both ends.
    ///
    /// # Errors
    ///
    /// Propagates the store fetch failure.
    pub async fn tasks_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        let tasks = self.store.fetch_tasks().await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.is_open() && t.due_date.is_some_and(|d| d >= from && d <= to))
            .collect())
    }

    /// All open tasks, in snapshot order.
    ///
    /// # Errors
    ///
    /// Propagates the store fetch failure.
    pub async fn open_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = self.store.fetch_tasks().await?;
        Ok(tasks.into_iter().filter(Task::is_open).collect())
    }

    /// Unticked checklist items due exactly on `date`, paired with their task.
    ///
    /// Items of done tasks are excluded along with the task.
    ///
    /// # Errors
    ///
    /// Propagates the store fetch failure.
    pub async fn checklist_items_due_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<(Task, ChecklistItem)>, StoreError> {
        let tasks = self.store.fetch_tasks().await?;
        let mut due = Vec::new();
        for task in tasks.into_iter().filter(Task::is_open) {
            for item in &task.checklist {
                if !item.done && item.due_date == Some(date) {
                    due.push((task.clone(), item.clone()));
                }
            }
        }
        Ok(due)
    }

    /// The member roster.
    ///
    /// # Errors
    ///
    /// Propagates the store fetch failure.
    pub async fn members(&self) -> Result<Vec<Member>, StoreError> {
        self.store.fetch_members().await
    }
}

/// Groups tasks by assignee name, sorted by name, with an [`UNASSIGNED`]
/// bucket last. A task with several assignees appears in each of their
/// groups; within a group, snapshot order is kept.
#[must_use]
pub fn group_by_assignee(tasks: &[Task]) -> Vec<(String, Vec<Task>)> {
    let mut named: std::collections::BTreeMap<String, Vec<Task>> = std::collections::BTreeMap::new();
    let mut unassigned = Vec::new();
    for task in tasks {
        if task.assigned_to.is_empty() {
            unassigned.push(task.clone());
        } else {
            for name in &task.assigned_to {
                named.entry(name.clone()).or_default().push(task.clone());
            }
        }
    }
    let mut groups: Vec<(String, Vec<Task>)> = named.into_iter().collect();
    if !unassigned.is_empty() {
        groups.push((UNASSIGNED.to_string(), unassigned));
    }
    groups
}
