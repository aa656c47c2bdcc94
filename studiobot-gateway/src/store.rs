//! Keyed JSON document store.
//!
//! The [`DocumentStore`] holds one JSON tree with top-level collections
//! (`tasks`, `members`). Reads and writes address slash-separated paths;
//! writes create intermediate objects on demand and may index into arrays
//! with numeric segments. Watch notifications always carry the full current
//! value of the affected collection, never a delta.

use serde_json::Value;
use tokio::sync::RwLock;

/// Errors produced by path-addressed writes.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The path was empty.
    #[error("write path must not be empty")]
    EmptyPath,

    /// A numeric segment indexed past the end of an array.
    #[error("array index {index} out of bounds at segment '{segment}'")]
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// The path segment that produced it.
        segment: String,
    },

    /// A path segment tried to descend into a scalar value.
    #[error("cannot descend into non-container value at segment '{0}'")]
    NotAContainer(String),
}

/// Thread-safe JSON tree addressed by slash-separated paths.
pub struct DocumentStore {
    root: RwLock<Value>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// Creates an empty store (root is an empty object).
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(serde_json::Map::new())),
        }
    }

    /// Creates a store seeded with an initial tree.
    #[must_use]
    pub fn with_root(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
        }
    }

    /// Reads the value at `path`, or `Value::Null` when absent.
    ///
    /// An empty path returns the whole tree.
    pub async fn read(&self, path: &str) -> Value {
        let root = self.root.read().await;
        let mut current = &*root;
        for segment in segments(path) {
            current = match current {
                Value::Object(map) => map.get(segment).unwrap_or(&Value::Null),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i))
                    .unwrap_or(&Value::Null),
                _ => &Value::Null,
            };
        }
        current.clone()
    }

    /// Writes `value` at `path`, creating intermediate objects as needed.
    ///
    /// Returns the name of the affected top-level collection (the first path
    /// segment) so the caller can notify its watchers.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] for an empty path, an out-of-bounds array
    /// index, or an attempt to descend into a scalar.
    pub async fn write(&self, path: &str, value: Value) -> Result<String, WriteError> {
        let parts: Vec<&str> = segments(path).collect();
        let Some((&collection, _)) = parts.split_first() else {
            return Err(WriteError::EmptyPath);
        };

        let mut root = self.root.write().await;
        let mut current = &mut *root;
        for (i, segment) in parts.iter().enumerate() {
            let last = i == parts.len() - 1;
            match current {
                Value::Object(map) => {
                    if last {
                        map.insert((*segment).to_string(), value);
                        return Ok(collection.to_string());
                    }
                    current = map
                        .entry((*segment).to_string())
                        .or_insert_with(|| Value::Object(serde_json::Map::new()));
                }
                Value::Array(items) => {
                    let index = segment.parse::<usize>().map_err(|_| {
                        WriteError::NotAContainer((*segment).to_string())
                    })?;
                    let slot =
                        items
                            .get_mut(index)
                            .ok_or_else(|| WriteError::IndexOutOfBounds {
                                index,
                                segment: (*segment).to_string(),
                            })?;
                    if last {
                        *slot = value;
                        return Ok(collection.to_string());
                    }
                    current = slot;
                }
                _ => return Err(WriteError::NotAContainer((*segment).to_string())),
            }
        }
        // Unreachable: the loop always returns on the last segment.
        Err(WriteError::EmptyPath)
    }
}

/// Splits a slash-separated path into non-empty segments.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
