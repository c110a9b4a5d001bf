//! Apply change trees to the files of one target.
//!
//! Every file is read, parsed with the adapter its [`FileKind`] selects,
//! merged with `pop_key` set and the file's relative path as the root
//! structural path, and rendered back. [`ConfigUpdater::apply`] plans all
//! files of a target before writing any of them, so a failing file leaves
//! the working tree and the remove state untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use expgen_formats::{FileKind, FormatError};
use expgen_merge::merge;
use expgen_types::{index_segment, path_join, ChangeValue, RemoveState};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::diff::{diff_stat, unified_diff, DiffStat};
use crate::error::{ExperimentError, ExperimentResult};
use crate::forcing::prepare_forcing_change;

/// The rendered result of merging one file, not yet written.
#[derive(Clone, Debug)]
pub struct FileUpdate {
    /// Path relative to the repository, as named in the input file.
    pub file: String,
    pub kind: FileKind,
    pub path: PathBuf,
    pub contents: String,
    pub stat: DiffStat,
}

impl FileUpdate {
    pub fn is_changed(&self) -> bool {
        !self.stat.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ConfigUpdater {
    directory: PathBuf,
    jobname: String,
}

impl ConfigUpdater {
    /// Updater for the repository checked out at `directory`. The payu
    /// `jobname` is pinned to the directory name.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        let jobname = directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { directory, jobname }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn jobname(&self) -> &str {
        &self.jobname
    }

    /// Merge `change` into `file` and render the result without writing it.
    ///
    /// Returns `Ok(None)` for files no adapter handles and for empty changes.
    pub fn plan_file(
        &self,
        file: &str,
        change: &Value,
        state: &mut RemoveState,
    ) -> ExperimentResult<Option<FileUpdate>> {
        let Some(kind) = FileKind::detect(file) else {
            warn!(%file, "no adapter for this file type; skipping");
            return Ok(None);
        };
        if change.is_null() || change.as_object().is_some_and(Map::is_empty) {
            debug!(%file, "empty change; skipping");
            return Ok(None);
        }

        let path = self.directory.join(file);
        let original = fs::read_to_string(&path).map_err(|e| ExperimentError::io(&path, e))?;
        let format = kind.format();
        let format_err = |source: FormatError| ExperimentError::Format {
            file: file.to_string(),
            source,
        };

        let mut tree = format.parse(&original).map_err(format_err)?;
        match kind {
            FileKind::Forcing => merge_forcing(file, &mut tree, change, state)?,
            _ => {
                let change = self.prepare_change(kind, file, change)?;
                merge(&mut tree, &change, file, state, true).map_err(|source| ExperimentError::Merge {
                    file: file.to_string(),
                    source,
                })?;
            }
        }
        let contents = format.render(&original, &tree).map_err(format_err)?;

        let stat = diff_stat(&original, &contents);
        if !stat.is_empty() {
            debug!(%file, %kind, diff = %unified_diff(file, &original, &contents), "planned update");
        }
        Ok(Some(FileUpdate {
            file: file.to_string(),
            kind,
            path,
            contents,
            stat,
        }))
    }

    /// Update every file in `files`, all or nothing.
    ///
    /// All files are planned against a scratch copy of `state` first. Only
    /// when every file merged are the changed ones written and `state`
    /// replaced by the scratch copy.
    pub fn apply(
        &self,
        files: &IndexMap<String, Value>,
        state: &mut RemoveState,
    ) -> ExperimentResult<Vec<FileUpdate>> {
        let mut scratch = state.clone();
        let mut planned = Vec::with_capacity(files.len());
        for (file, change) in files {
            if let Some(update) = self.plan_file(file, change, &mut scratch)? {
                planned.push(update);
            }
        }

        for update in planned.iter().filter(|u| u.is_changed()) {
            write_atomic(&update.path, &update.contents)?;
            info!(
                file = %update.file,
                additions = update.stat.additions,
                deletions = update.stat.deletions,
                "updated"
            );
        }
        *state = scratch;
        Ok(planned)
    }

    /// Turn a raw change into a change tree, applying the per-kind rules.
    fn prepare_change(&self, kind: FileKind, file: &str, change: &Value) -> ExperimentResult<ChangeValue> {
        let Value::Object(map) = change else {
            return Err(ExperimentError::InvalidChange {
                file: file.to_string(),
                message: "the change must be a mapping".into(),
            });
        };
        let mut map = map.clone();
        match kind {
            FileKind::PayuConfig => self.pin_jobname(&mut map),
            FileKind::Namelist => expand_turning_angle(file, &mut map)?,
            _ => {}
        }
        Ok(ChangeValue::from_json(&Value::Object(map)))
    }

    fn pin_jobname(&self, map: &mut Map<String, Value>) {
        if let Some(requested) = map.get("jobname") {
            if requested.as_str() != Some(self.jobname.as_str()) {
                warn!(
                    requested = %requested,
                    jobname = %self.jobname,
                    "jobname must match the experiment directory; forcing it"
                );
            }
        }
        map.insert("jobname".into(), Value::String(self.jobname.clone()));
    }
}

/// Replace `turning_angle` (degrees) in any namelist group by its `cosw` and
/// `sinw` components.
fn expand_turning_angle(file: &str, groups: &mut Map<String, Value>) -> ExperimentResult<()> {
    for (group, entries) in groups.iter_mut() {
        let Some(entries) = entries.as_object_mut() else {
            continue;
        };
        let Some(angle) = entries.get("turning_angle") else {
            continue;
        };
        if angle.as_str().is_some_and(|s| s == "REMOVE" || s == "PRESERVE") {
            continue;
        }
        let degrees = angle.as_f64().ok_or_else(|| ExperimentError::InvalidChange {
            file: file.to_string(),
            message: format!("{group}.turning_angle must be a number of degrees, got {angle}"),
        })?;
        let radians = degrees.to_radians();
        entries.shift_remove("turning_angle");
        entries.insert("cosw".into(), Value::from(radians.cos()));
        entries.insert("sinw".into(), Value::from(radians.sin()));
    }
    Ok(())
}

fn merge_forcing(file: &str, tree: &mut Value, change: &Value, state: &mut RemoveState) -> ExperimentResult<()> {
    let prepared = prepare_forcing_change(file, change)?;
    let inputs = tree
        .get_mut("inputs")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ExperimentError::InvalidChange {
            file: file.to_string(),
            message: "the forcing file has no 'inputs' list".into(),
        })?;

    for (fieldname, updates) in prepared {
        let idx = inputs
            .iter()
            .position(|input| input.get("fieldname").and_then(Value::as_str) == Some(fieldname.as_str()))
            .ok_or_else(|| ExperimentError::InvalidChange {
                file: file.to_string(),
                message: format!("no input with fieldname {fieldname:?}"),
            })?;
        let path = path_join(&path_join(file, "inputs"), &index_segment(idx));
        merge(&mut inputs[idx], &ChangeValue::from_json(&updates), &path, state, true).map_err(|source| {
            ExperimentError::Merge {
                file: file.to_string(),
                source,
            }
        })?;
    }
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> ExperimentResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ExperimentError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| ExperimentError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| ExperimentError::io(path, e.error))?;
    Ok(())
}
