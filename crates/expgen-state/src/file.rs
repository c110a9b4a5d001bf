//! Filesystem state store: one pretty-printed JSON file per target.
//!
//! Layout: `<root_dir>/<dirname>/<target>.json`. A target containing `/`
//! lands in a nested directory. Saves go through a temporary file in the
//! same directory and are renamed into place, so a crash never leaves a
//! truncated state file behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use expgen_types::RemoveState;
use serde_json::Value;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::names::validate_target_name;
use crate::traits::StateStore;

/// Directory name used under the root when none is given.
pub const DEFAULT_STATE_DIRNAME: &str = ".remove_state";

#[derive(Clone, Debug)]
pub struct FileStateStore {
    root_dir: PathBuf,
    dirname: String,
}

impl FileStateStore {
    /// Store under `<root_dir>/.remove_state`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_dirname(root_dir, DEFAULT_STATE_DIRNAME)
    }

    pub fn with_dirname(root_dir: impl Into<PathBuf>, dirname: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            dirname: dirname.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn dirname(&self) -> &str {
        &self.dirname
    }

    /// The state directory, created if missing.
    pub fn state_dir(&self) -> StateResult<PathBuf> {
        let dir = self.root_dir.join(&self.dirname);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Path of the state file for `target`. Creates the state directory, and
    /// any nested directory a `/` in the name implies.
    pub fn state_path(&self, target: &str) -> StateResult<PathBuf> {
        validate_target_name(target)?;
        let path = self.state_dir()?.join(format!("{target}.json"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

impl StateStore for FileStateStore {
    fn load(&self, target: &str) -> StateResult<RemoveState> {
        let path = self.state_path(target)?;
        if !path.exists() {
            debug!(%target, "no saved state; starting empty");
            return Ok(RemoveState::new());
        }

        let text = fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&text).map_err(|e| StateError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(StateError::Corrupt {
                path,
                reason: "top-level value is not an object".into(),
            });
        }
        let state: RemoveState =
            serde_json::from_value(value).map_err(|e| StateError::Serialization(e.to_string()))?;
        debug!(%target, entries = state.len(), "loaded state");
        Ok(state)
    }

    fn save(&self, target: &str, state: &RemoveState) -> StateResult<()> {
        let path = self.state_path(target)?;
        let dir = path.parent().unwrap_or(&self.root_dir);

        let body = serde_json::to_string_pretty(state)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StateError::Io(e.error))?;

        debug!(%target, entries = state.len(), path = %path.display(), "saved state");
        Ok(())
    }

    fn contains(&self, target: &str) -> StateResult<bool> {
        Ok(self.state_path(target)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RemoveState {
        [
            ("a".to_string(), json!(1)),
            ("nested".to_string(), json!({"x": [1, 2, 3]})),
            ("path::REMOVE[0]".to_string(), json!("/g/data/foo/bar.nc")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn state_path_creates_dir_and_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        let p = store.state_path("perturb_1").unwrap();

        assert!(dir.path().join(DEFAULT_STATE_DIRNAME).is_dir());
        assert_eq!(p.file_name().unwrap(), "perturb_1.json");
        assert_eq!(p.parent().unwrap(), dir.path().join(DEFAULT_STATE_DIRNAME));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(store.load("does_not_exist").unwrap().is_empty());
        assert!(!store.contains("does_not_exist").unwrap());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        let state = sample();

        store.save("perturb_1", &state).unwrap();

        let path = store.state_path("perturb_1").unwrap();
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            on_disk,
            json!({
                "a": 1,
                "nested": {"x": [1, 2, 3]},
                "path::REMOVE[0]": "/g/data/foo/bar.nc",
            })
        );
        assert_eq!(store.load("perturb_1").unwrap(), state);
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        let first: RemoveState = [("a".to_string(), json!(1))].into_iter().collect();
        let second: RemoveState = [("a".to_string(), json!(2)), ("b".to_string(), json!(3))]
            .into_iter()
            .collect();
        store.save("perturb_1", &first).unwrap();
        store.save("perturb_1", &second).unwrap();

        assert_eq!(store.load("perturb_1").unwrap(), second);
    }

    #[test]
    fn custom_dirname() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::with_dirname(dir.path(), ".my_states");
        let state: RemoveState = [("k".to_string(), json!("v"))].into_iter().collect();

        store.save("perturb_2", &state).unwrap();

        assert!(dir.path().join(".my_states").is_dir());
        assert!(dir.path().join(".my_states/perturb_2.json").exists());
        assert_eq!(store.load("perturb_2").unwrap(), state);
    }

    #[test]
    fn nested_target_gets_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save("block/run1", &sample()).unwrap();
        assert!(dir.path().join(".remove_state/block/run1.json").exists());
        assert_eq!(store.load("block/run1").unwrap(), sample());
    }

    #[test]
    fn escaping_target_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(matches!(
            store.save("../escape", &sample()),
            Err(StateError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn non_object_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        fs::write(store.state_path("bad").unwrap(), "[1, 2]").unwrap();
        assert!(matches!(store.load("bad"), Err(StateError::Corrupt { .. })));

        fs::write(store.state_path("garbled").unwrap(), "{not json").unwrap();
        assert!(matches!(store.load("garbled"), Err(StateError::Corrupt { .. })));
    }
}
