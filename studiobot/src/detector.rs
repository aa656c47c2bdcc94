//! Snapshot diffing: turns consecutive full snapshots of the task
//! collection into notification events.
//!
//! Tasks are matched by id, never by position, so reordering and deletions
//! do not misattribute changes. The first snapshot after startup only seeds
//! the baseline; nothing pre-existing is announced.

use std::collections::HashMap;

use studiobot_proto::event::NotificationEvent;
use studiobot_proto::task::Task;

/// Stateful diff engine over the task collection.
///
/// Single consumer: callers feed snapshots in arrival order from one place.
#[derive(Default)]
pub struct ChangeDetector {
    /// Tasks from the last accepted snapshot, keyed by id. `None` until the
    /// first snapshot seeds it.
    previous: Option<HashMap<String, Task>>,
}

impl ChangeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a baseline has been seeded yet.
    #[must_use]
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Diffs `snapshot` against the baseline and replaces the baseline.
    ///
    /// Returns events in snapshot order. The first call returns no events.
    /// Per task, a status change and an assignment change are independent
    /// and may both fire. Tasks absent from the new snapshot are dropped
    /// from the baseline silently.
    pub fn observe(&mut self, snapshot: &[Task]) -> Vec<NotificationEvent> {
        let next: HashMap<String, Task> = snapshot
            .iter()
            .map(|t| (t.id.clone(), t.clone()))
            .collect();

        let Some(previous) = &self.previous else {
            tracing::info!(tasks = snapshot.len(), "baseline seeded, nothing announced");
            self.previous = Some(next);
            return Vec::new();
        };

        let mut events = Vec::new();
        for task in snapshot {
            match previous.get(&task.id) {
                None => {
                    // New tasks without assignees stay silent until someone
                    // is assigned.
                    if !task.assigned_to.is_empty() {
                        events.push(NotificationEvent::NewTask(task.clone()));
                    }
                }
                Some(old) => {
                    if old.status != task.status {
                        events.push(NotificationEvent::StatusChanged {
                            task: task.clone(),
                            old: old.status,
                            new: task.status,
                        });
                    }
                    let added: Vec<String> = task
                        .assigned_to
                        .iter()
                        .filter(|name| !old.assigned_to.contains(name))
                        .cloned()
                        .collect();
                    if !added.is_empty() {
                        events.push(NotificationEvent::NewAssignment {
                            task: task.clone(),
                            added,
                        });
                    }
                }
            }
        }

        self.previous = Some(next);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studiobot_proto::task::TaskStatus;

    fn task(id: &str, status: TaskStatus, assigned: &[&str]) -> Task {
        let mut t = Task::new(id, format!("task {id}"), status);
        t.assigned_to = assigned.iter().map(|s| (*s).to_string()).collect();
        t
    }

    #[test]
    fn first_snapshot_seeds_baseline_silently() {
        let mut detector = ChangeDetector::new();
        let events = detector.observe(&[task("a", TaskStatus::Todo, &["Mario"])]);
        assert!(events.is_empty());
        assert!(detector.has_baseline());
    }

    #[test]
    fn new_assigned_task_fires_once() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[]);
        let snapshot = [task("a", TaskStatus::Todo, &["Mario"])];
        let events = detector.observe(&snapshot);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], NotificationEvent::NewTask(t) if t.id == "a"));

        // Unchanged snapshot fires nothing.
        assert!(detector.observe(&snapshot).is_empty());
    }

    #[test]
    fn new_unassigned_task_is_silent_until_assigned() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[]);
        assert!(detector.observe(&[task("a", TaskStatus::Todo, &[])]).is_empty());

        // Once someone is assigned, it surfaces as an assignment event.
        let events = detector.observe(&[task("a", TaskStatus::Todo, &["Lucia"])]);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            NotificationEvent::NewAssignment { added, .. } if added == &["Lucia".to_string()]
        ));
    }

    #[test]
    fn status_and_assignment_changes_both_fire() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[task("a", TaskStatus::Todo, &["Mario"])]);
        let events = detector.observe(&[task("a", TaskStatus::Done, &["Mario", "Lucia"])]);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            NotificationEvent::StatusChanged { old: TaskStatus::Todo, new: TaskStatus::Done, .. }
        ));
        assert!(matches!(
            &events[1],
            NotificationEvent::NewAssignment { added, .. } if added == &["Lucia".to_string()]
        ));
    }

    #[test]
    fn removed_assignees_are_not_reported() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[task("a", TaskStatus::Todo, &["Mario", "Lucia"])]);
        let events = detector.observe(&[task("a", TaskStatus::Todo, &["Mario"])]);
        assert!(events.is_empty());
    }

    #[test]
    fn deleted_tasks_are_not_reported() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[
            task("a", TaskStatus::Todo, &["Mario"]),
            task("b", TaskStatus::Todo, &["Lucia"]),
        ]);
        let events = detector.observe(&[task("a", TaskStatus::Todo, &["Mario"])]);
        assert!(events.is_empty());

        // Reappearing after deletion counts as new.
        let events = detector.observe(&[
            task("a", TaskStatus::Todo, &["Mario"]),
            task("b", TaskStatus::Todo, &["Lucia"]),
        ]);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], NotificationEvent::NewTask(t) if t.id == "b"));
    }

    #[test]
    fn reorder_alone_fires_nothing() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[
            task("a", TaskStatus::Todo, &["Mario"]),
            task("b", TaskStatus::Done, &["Lucia"]),
        ]);
        let events = detector.observe(&[
            task("b", TaskStatus::Done, &["Lucia"]),
            task("a", TaskStatus::Todo, &["Mario"]),
        ]);
        assert!(events.is_empty());
    }

    #[test]
    fn events_follow_snapshot_order() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[
            task("a", TaskStatus::Todo, &["Mario"]),
            task("b", TaskStatus::Todo, &["Lucia"]),
        ]);
        let events = detector.observe(&[
            task("b", TaskStatus::Inprogress, &["Lucia"]),
            task("a", TaskStatus::Done, &["Mario"]),
        ]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].task_id(), "b");
        assert_eq!(events[1].task_id(), "a");
    }
}
