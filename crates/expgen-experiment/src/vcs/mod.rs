//! Version control of the experiment repository.
//!
//! The generator only needs a handful of operations, captured by
//! [`VersionControl`]. [`GitCli`] drives the `git` executable;
//! [`InMemoryVcs`] keeps per-branch snapshots of a plain directory and
//! records every call, for tests.

mod git;
mod memory;

use std::path::Path;

use crate::error::ExperimentResult;

pub use git::GitCli;
pub use memory::{CommitRecord, InMemoryVcs};

pub trait VersionControl: Send + Sync {
    /// Clone `url` into `dest`, checking out `branch` when given.
    fn clone_repository(&self, url: &str, dest: &Path, branch: Option<&str>) -> ExperimentResult<()>;

    /// Names of the local branches of `repo`.
    fn local_branches(&self, repo: &Path) -> ExperimentResult<Vec<String>>;

    /// Check out `branch`. With `create_from`, the branch is created at that
    /// start point first and must not exist yet.
    fn checkout(&self, repo: &Path, branch: &str, create_from: Option<&str>) -> ExperimentResult<()>;

    /// Tracked files whose working copy differs from the last commit,
    /// relative to `repo`.
    fn modified_files(&self, repo: &Path) -> ExperimentResult<Vec<String>>;

    /// Stage `files` and commit them on the current branch.
    fn commit(&self, repo: &Path, message: &str, files: &[String]) -> ExperimentResult<()>;

    fn has_branch(&self, repo: &Path, branch: &str) -> ExperimentResult<bool> {
        Ok(self.local_branches(repo)?.iter().any(|b| b == branch))
    }
}
