//! Task model and snapshot normalization.
//!
//! The backing store serializes the task collection in two shapes: a JSON
//! array (with possible `null` slots) or an object keyed by task id. Both
//! shapes are normalized here into one ordered `Vec<Task>` so that nothing
//! downstream ever sees the duality.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started yet.
    Todo,
    /// Actively being worked on.
    Inprogress,
    /// Completed.
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::Inprogress => write!(f, "inprogress"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Priority of a task. Defaults to [`Priority::Medium`] when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// Normal.
    #[default]
    Medium,
    /// Urgent.
    High,
}

/// A single checklist entry inside a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    /// What needs doing.
    pub text: String,
    /// Whether the item has been ticked off.
    #[serde(default)]
    pub done: bool,
    /// Member responsible for this item, if any.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Calendar due date of this item, if any.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub due_date: Option<NaiveDate>,
}

/// A task as stored in the shared collection.
///
/// Mutated by the surrounding management app; consumed read-only by the bot
/// except for status and checklist updates triggered by chat commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier. May be absent in the serialized form when the
    /// collection is keyed by id; normalization injects the key.
    #[serde(default)]
    pub id: String,
    /// Task title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Current status.
    pub status: TaskStatus,
    /// Priority, defaulting to medium.
    #[serde(default)]
    pub priority: Priority,
    /// Single responsible member, if any.
    #[serde(default)]
    pub owner: Option<String>,
    /// Members assigned to the task. Order follows the stored list.
    #[serde(default)]
    pub assigned_to: Vec<String>,
    /// Calendar due date (no time component), if any.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub due_date: Option<NaiveDate>,
    /// Ordered checklist.
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    /// Creation time, milliseconds since epoch.
    #[serde(default)]
    pub created_at: u64,
}

impl Task {
    /// Creates a task with the given identity and status; everything else
    /// starts empty or at its default.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status,
            priority: Priority::default(),
            owner: None,
            assigned_to: Vec::new(),
            due_date: None,
            checklist: Vec::new(),
            created_at: 0,
        }
    }

    /// Whether the task still counts for due-date views (not done).
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Done
    }
}

/// Errors produced while normalizing a raw snapshot into tasks.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The snapshot root was neither an array, an object, nor null.
    #[error("unexpected snapshot shape: expected array or object, got {0}")]
    UnexpectedShape(String),

    /// An entry could not be deserialized as a task.
    #[error("malformed task entry at {key}: {source}")]
    MalformedEntry {
        /// Array index or map key of the offending entry.
        key: String,
        /// Underlying deserialization error.
        source: serde_json::Error,
    },

    /// An array-form entry carried no usable id.
    #[error("task entry at index {0} has no id")]
    MissingId(usize),
}

/// Normalizes a raw snapshot of the task collection into an ordered sequence.
///
/// Accepts the array form (null/empty slots filtered out, order preserved)
/// and the keyed-map form (entries ordered by key, key injected as `id` when
/// the entry lacks one). `null` normalizes to an empty collection.
///
/// # Errors
///
/// Returns [`ModelError`] if the root shape is unrecognized, an entry fails
/// to deserialize, or an array entry has no id. Callers treat any error as a
/// malformed snapshot: log, discard, keep the previous baseline.
pub fn normalize(value: &serde_json::Value) -> Result<Vec<Task>, ModelError> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(entries) => {
            let mut tasks = Vec::with_capacity(entries.len());
            for (index, entry) in entries.iter().enumerate() {
                if entry.is_null() {
                    continue;
                }
                let task: Task = serde_json::from_value(entry.clone()).map_err(|source| {
                    ModelError::MalformedEntry {
                        key: index.to_string(),
                        source,
                    }
                })?;
                if task.id.is_empty() {
                    return Err(ModelError::MissingId(index));
                }
                tasks.push(task);
            }
            Ok(tasks)
        }
        serde_json::Value::Object(map) => {
            // BTreeMap gives a deterministic key order for the map form.
            let ordered: BTreeMap<&String, &serde_json::Value> = map.iter().collect();
            let mut tasks = Vec::with_capacity(ordered.len());
            for (key, entry) in ordered {
                if entry.is_null() {
                    continue;
                }
                let mut task: Task = serde_json::from_value(entry.clone()).map_err(|source| {
                    ModelError::MalformedEntry {
                        key: key.clone(),
                        source,
                    }
                })?;
                if task.id.is_empty() {
                    task.id = key.clone();
                }
                tasks.push(task);
            }
            Ok(tasks)
        }
        other => Err(ModelError::UnexpectedShape(type_name(other).to_string())),
    }
}

/// Short JSON type name for error messages.
fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Deserializes an optional date, treating `""` and `null` as absent.
///
/// The management app writes empty strings for cleared date inputs.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
