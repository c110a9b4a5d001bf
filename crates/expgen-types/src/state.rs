//! The remove-state map carried across merge invocations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::{base_state_key, remove_state_key, BASE_SUFFIX, REMOVE_INFIX};

/// Per-target record of baseline list snapshots and positional removals.
///
/// Keys are structural paths suffixed with `::BASE` (a deep copy of a base
/// list taken the first time that path was merged) or `::REMOVE[i]` (the
/// baseline element a positional `REMOVE` dropped). The map is opaque to
/// storage: it serializes as a flat JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoveState {
    entries: BTreeMap<String, Value>,
}

impl RemoveState {
    /// Create an empty state map.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a raw entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Baseline snapshot of the list at `path`, if one was captured.
    pub fn baseline(&self, path: &str) -> Option<&Value> {
        self.entries.get(&base_state_key(path))
    }

    /// Capture `list` as the baseline for `path` unless one already exists.
    ///
    /// Returns the snapshot now in effect.
    pub fn capture_baseline(&mut self, path: &str, list: &[Value]) -> &Value {
        self.entries
            .entry(base_state_key(path))
            .or_insert_with(|| Value::Array(list.to_vec()))
    }

    /// Record the baseline element dropped by a positional `REMOVE`.
    ///
    /// The first record for a slot wins.
    pub fn record_removal(&mut self, path: &str, index: usize, removed: &Value) {
        self.entries
            .entry(remove_state_key(path, index))
            .or_insert_with(|| removed.clone());
    }

    /// Number of baseline snapshots held.
    pub fn baseline_count(&self) -> usize {
        self.entries.keys().filter(|k| k.ends_with(BASE_SUFFIX)).count()
    }

    /// Number of positional removal records held.
    pub fn removal_count(&self) -> usize {
        self.entries.keys().filter(|k| k.contains(REMOVE_INFIX)).count()
    }
}

impl FromIterator<(String, Value)> for RemoveState {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
