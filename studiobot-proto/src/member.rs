//! Member model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::task::ModelError;

/// A studio member as stored in the `members` collection.
///
/// The store also tracks auxiliary counters (cleaning duty and the like);
/// the bot only needs the identity and display name, so unknown fields are
/// ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Unique member identifier.
    #[serde(default)]
    pub id: String,
    /// Unique display name, the value tasks reference in `assignedTo`.
    pub name: String,
}

/// Normalizes a raw snapshot of the member collection.
///
/// Same duality handling as [`crate::task::normalize`]: array form with null
/// slots filtered, or keyed-map form with the key injected as `id`.
///
/// # Errors
///
/// Returns [`ModelError`] for unrecognized shapes or malformed entries.
pub fn normalize(value: &serde_json::Value) -> Result<Vec<Member>, ModelError> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(entries) => {
            let mut members = Vec::with_capacity(entries.len());
            for (index, entry) in entries.iter().enumerate() {
                if entry.is_null() {
                    continue;
                }
                let member: Member = serde_json::from_value(entry.clone()).map_err(|source| {
                    ModelError::MalformedEntry {
                        key: index.to_string(),
                        source,
                    }
                })?;
                members.push(member);
            }
            Ok(members)
        }
        serde_json::Value::Object(map) => {
            let ordered: BTreeMap<&String, &serde_json::Value> = map.iter().collect();
            let mut members = Vec::with_capacity(ordered.len());
            for (key, entry) in ordered {
                if entry.is_null() {
                    continue;
                }
                let mut member: Member =
                    serde_json::from_value(entry.clone()).map_err(|source| {
                        ModelError::MalformedEntry {
                            key: key.clone(),
                            source,
                        }
                    })?;
                if member.id.is_empty() {
                    member.id = key.clone();
                }
                members.push(member);
            }
            Ok(members)
        }
        other => Err(ModelError::UnexpectedShape(
            match other {
                serde_json::Value::Bool(_) => "bool",
                serde_json::Value::Number(_) => "number",
                serde_json::Value::String(_) => "string",
                _ => "unknown",
            }
            .to_string(),
        )),
    }
}
