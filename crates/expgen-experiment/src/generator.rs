//! Control and perturbation orchestration.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use expgen_state::{FileStateStore, StateStore};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ExperimentConfig;
use crate::definition::{collect_experiment_definitions, ExperimentDefinition};
use crate::diff::DiffStat;
use crate::error::{ExperimentError, ExperimentResult};
use crate::updater::{ConfigUpdater, FileUpdate};
use crate::vcs::{GitCli, VersionControl};

/// Directories never searched for configuration files.
pub const EXCLUDED_DIRS: &[&str] = &[".git", ".github", "testing", "docs"];

/// One file rewritten for a target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub file: String,
    #[serde(flatten)]
    pub stat: DiffStat,
}

/// What happened to one target (the control experiment or one
/// perturbation branch).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    /// Remove-state target name.
    pub target: String,
    pub branch: Option<String>,
    pub changed: Vec<FileChange>,
    /// Commit message, when something was committed.
    pub commit: Option<String>,
    pub error: Option<String>,
}

impl TargetOutcome {
    fn failed(target: &str, branch: &str, error: &ExperimentError) -> Self {
        Self {
            target: target.to_string(),
            branch: Some(branch.to_string()),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub control: TargetOutcome,
    pub perturbations: Vec<TargetOutcome>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.perturbations.iter().filter(|p| !p.is_ok()).count()
    }
}

pub struct ExperimentGenerator<V, S> {
    config: ExperimentConfig,
    vcs: V,
    store: S,
}

impl ExperimentGenerator<GitCli, FileStateStore> {
    /// Generator using the `git` executable, with remove state kept under
    /// the configured `test_path`.
    pub fn with_git(config: ExperimentConfig) -> Self {
        let store = FileStateStore::new(&config.test_path);
        Self::new(config, GitCli::new(), store)
    }
}

impl<V: VersionControl, S: StateStore> ExperimentGenerator<V, S> {
    pub fn new(config: ExperimentConfig, vcs: V, store: S) -> Self {
        Self { config, vcs, store }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Set up the repository, then generate the control experiment and
    /// every perturbation branch.
    ///
    /// Errors before or during the control experiment abort the run. A
    /// failing perturbation branch is recorded in the report and the
    /// remaining branches still run.
    pub fn run(&self) -> ExperimentResult<RunReport> {
        let test_path = &self.config.test_path;
        fs::create_dir_all(test_path).map_err(|e| ExperimentError::io(test_path, e))?;
        self.config.validate()?;
        self.ensure_repository()?;

        let control = self.run_control()?;
        let perturbations = if self.config.has_perturbations() {
            self.run_perturbations()?
        } else {
            warn!("no perturbation experiments configured");
            Vec::new()
        };
        Ok(RunReport { control, perturbations })
    }

    fn repository(&self) -> PathBuf {
        self.config.repository_path()
    }

    fn ensure_repository(&self) -> ExperimentResult<()> {
        let repo = self.repository();
        if repo.exists() {
            info!(path = %repo.display(), "repository already exists; skipping clone");
            return Ok(());
        }
        let url = self.config.repository_url.as_deref().ok_or_else(|| {
            ExperimentError::InvalidConfig("repository_url is required to clone the repository".into())
        })?;
        info!(%url, path = %repo.display(), "cloning repository");
        self.vcs
            .clone_repository(url, &repo, self.config.existing_branch.as_deref())
    }

    /// Check out `branch`, creating it at `start` if it does not exist.
    fn switch_branch(&self, branch: &str, start: &str) -> ExperimentResult<()> {
        let repo = self.repository();
        if self.vcs.has_branch(&repo, branch)? {
            info!(%branch, "checking out existing branch");
            self.vcs.checkout(&repo, branch, None)
        } else {
            info!(%branch, %start, "creating branch");
            self.vcs.checkout(&repo, branch, Some(start))
        }
    }

    pub fn run_control(&self) -> ExperimentResult<TargetOutcome> {
        let branch = self.config.control_branch_name.clone();
        if let Some(branch) = &branch {
            let start = self.config.start_point.as_deref().unwrap_or("HEAD");
            self.switch_branch(branch, start)?;
        }
        let files = self.select_files(&self.config.control_experiment)?;
        let mut outcome = self.update_target(self.config.control_target(), &files, "Updated control files")?;
        outcome.branch = branch;
        Ok(outcome)
    }

    pub fn run_perturbations(&self) -> ExperimentResult<Vec<TargetOutcome>> {
        let Some(blocks) = &self.config.perturbation_experiment else {
            return Ok(Vec::new());
        };
        let control = self.config.control_branch_name.as_deref().ok_or_else(|| {
            ExperimentError::InvalidConfig("control_branch_name is required for perturbation experiments".into())
        })?;

        let definitions = collect_experiment_definitions(blocks)?;
        let mut outcomes = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            let branch = &definition.branch_name;
            match self.run_perturbation(definition, control) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(%branch, error = %e, "perturbation experiment failed");
                    outcomes.push(TargetOutcome::failed(branch, branch, &e));
                }
            }
        }
        Ok(outcomes)
    }

    fn run_perturbation(&self, definition: &ExperimentDefinition, control: &str) -> ExperimentResult<TargetOutcome> {
        let branch = &definition.branch_name;
        self.switch_branch(branch, control)?;
        let files = self.select_files(&definition.file_params)?;
        let mut outcome = self.update_target(branch, &files, "Updated perturbation files")?;
        outcome.branch = Some(branch.clone());
        Ok(outcome)
    }

    /// Keep the entries of `changes` that name a file in the repository.
    fn select_files(&self, changes: &IndexMap<String, Value>) -> ExperimentResult<IndexMap<String, Value>> {
        let present = repository_files(&self.repository())?;
        let mut selected = IndexMap::with_capacity(changes.len());
        for (file, change) in changes {
            if present.contains(file.as_str()) {
                selected.insert(file.clone(), change.clone());
            } else {
                warn!(%file, "not found in the repository; skipping");
            }
        }
        Ok(selected)
    }

    fn update_target(
        &self,
        target: &str,
        files: &IndexMap<String, Value>,
        message: &str,
    ) -> ExperimentResult<TargetOutcome> {
        let repo = self.repository();
        let mut state = self.store.load(target)?;
        let updates = ConfigUpdater::new(&repo).apply(files, &mut state)?;
        self.store.save(target, &state)?;

        let modified = self.vcs.modified_files(&repo)?;
        let commit = if modified.is_empty() {
            info!(%target, "no changes to commit");
            None
        } else {
            let message = format!("{message}: {modified:?}");
            self.vcs.commit(&repo, &message, &modified)?;
            info!(%target, files = modified.len(), "committed");
            Some(message)
        };

        Ok(TargetOutcome {
            target: target.to_string(),
            branch: None,
            changed: updates
                .iter()
                .filter(|u| u.is_changed())
                .map(|u: &FileUpdate| FileChange {
                    file: u.file.clone(),
                    stat: u.stat,
                })
                .collect(),
            commit,
            error: None,
        })
    }
}

/// Relative paths of every file under `repo`, outside [`EXCLUDED_DIRS`].
fn repository_files(repo: &Path) -> ExperimentResult<BTreeSet<String>> {
    let walker = WalkDir::new(repo).into_iter().filter_entry(|e| {
        e.depth() == 0
            || !(e.file_type().is_dir()
                && EXCLUDED_DIRS.iter().any(|d| e.file_name() == *d))
    });
    let mut files = BTreeSet::new();
    for entry in walker {
        let entry = entry.map_err(|e| ExperimentError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| repo.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(repo) {
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(name);
        }
    }
    Ok(files)
}
