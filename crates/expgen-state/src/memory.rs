//! In-memory state store for tests and embedding.

use std::collections::HashMap;
use std::sync::RwLock;

use expgen_types::RemoveState;

use crate::error::{StateError, StateResult};
use crate::names::validate_target_name;
use crate::traits::StateStore;

/// A [`StateStore`] backed by a `HashMap` behind a `RwLock`. Data is lost
/// when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, RemoveState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all targets with saved state, sorted.
    pub fn targets(&self) -> StateResult<Vec<String>> {
        let states = self.states.read().map_err(poisoned)?;
        let mut names: Vec<String> = states.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StateError {
    StateError::Serialization(format!("lock poisoned: {e}"))
}

impl StateStore for InMemoryStateStore {
    fn load(&self, target: &str) -> StateResult<RemoveState> {
        validate_target_name(target)?;
        let states = self.states.read().map_err(poisoned)?;
        Ok(states.get(target).cloned().unwrap_or_default())
    }

    fn save(&self, target: &str, state: &RemoveState) -> StateResult<()> {
        validate_target_name(target)?;
        let mut states = self.states.write().map_err(poisoned)?;
        states.insert(target.to_string(), state.clone());
        Ok(())
    }

    fn contains(&self, target: &str) -> StateResult<bool> {
        validate_target_name(target)?;
        let states = self.states.read().map_err(poisoned)?;
        Ok(states.contains_key(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_target_loads_empty() {
        let store = InMemoryStateStore::new();
        assert!(store.load("perturb_1").unwrap().is_empty());
        assert!(!store.contains("perturb_1").unwrap());
    }

    #[test]
    fn save_then_load() {
        let store = InMemoryStateStore::new();
        let mut state = RemoveState::new();
        state.capture_baseline("config.yaml.modules.use", &[json!("a"), json!("b")]);

        store.save("perturb_1", &state).unwrap();
        assert_eq!(store.load("perturb_1").unwrap(), state);
        assert!(store.contains("perturb_1").unwrap());
        assert_eq!(store.targets().unwrap(), vec!["perturb_1".to_string()]);
    }

    #[test]
    fn targets_are_independent() {
        let store = InMemoryStateStore::new();
        let mut a = RemoveState::new();
        a.insert("k", json!(1));
        store.save("a", &a).unwrap();
        assert!(store.load("b").unwrap().is_empty());
    }

    #[test]
    fn invalid_target_rejected() {
        let store = InMemoryStateStore::new();
        assert!(store.save("../x", &RemoveState::new()).is_err());
        assert!(store.load("").is_err());
    }
}
