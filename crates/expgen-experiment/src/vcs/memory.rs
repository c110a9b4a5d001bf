//! Snapshot-based version control for tests.
//!
//! [`InMemoryVcs`] treats any plain directory as a repository. Each branch
//! is a snapshot of file contents kept in memory; checking out a branch
//! rewrites the working directory from its snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use walkdir::WalkDir;

use super::VersionControl;
use crate::error::{ExperimentError, ExperimentResult};

type Snapshot = BTreeMap<String, Vec<u8>>;

/// A commit made through [`InMemoryVcs`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub branch: String,
    pub message: String,
    pub files: Vec<String>,
}

#[derive(Debug, Default)]
struct Repo {
    head: String,
    branches: BTreeMap<String, Snapshot>,
    commits: Vec<CommitRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryVcs {
    repos: RwLock<HashMap<PathBuf, Repo>>,
    calls: RwLock<Vec<String>>,
}

fn vcs_error(args: impl Into<String>, message: impl Into<String>) -> ExperimentError {
    ExperimentError::Vcs {
        args: args.into(),
        message: message.into(),
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> ExperimentError {
    vcs_error("<lock>", format!("lock poisoned: {e}"))
}

/// Read every file under `root` except the `.git` directory.
fn snapshot_dir(root: &Path) -> ExperimentResult<Snapshot> {
    let mut snapshot = Snapshot::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| vcs_error("snapshot", e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let contents = fs::read(entry.path()).map_err(|e| ExperimentError::io(entry.path(), e))?;
        snapshot.insert(name, contents);
    }
    Ok(snapshot)
}

fn write_file(path: &Path, contents: &[u8]) -> ExperimentResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExperimentError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| ExperimentError::io(path, e))
}

impl InMemoryVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking the directory `repo` with its current contents
    /// committed on `branch`.
    pub fn init(&self, repo: impl AsRef<Path>, branch: &str) -> ExperimentResult<()> {
        let repo = repo.as_ref();
        let snapshot = snapshot_dir(repo)?;
        let mut repos = self.repos.write().map_err(poisoned)?;
        repos.insert(
            repo.to_path_buf(),
            Repo {
                head: branch.to_string(),
                branches: BTreeMap::from([(branch.to_string(), snapshot)]),
                commits: Vec::new(),
            },
        );
        Ok(())
    }

    /// Every call made through [`VersionControl`], in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn commits(&self, repo: impl AsRef<Path>) -> Vec<CommitRecord> {
        self.repos
            .read()
            .ok()
            .and_then(|repos| repos.get(repo.as_ref()).map(|r| r.commits.clone()))
            .unwrap_or_default()
    }

    pub fn current_branch(&self, repo: impl AsRef<Path>) -> Option<String> {
        let repos = self.repos.read().ok()?;
        repos.get(repo.as_ref()).map(|r| r.head.clone())
    }

    /// Committed contents of `file` on `branch`.
    pub fn committed_file(&self, repo: impl AsRef<Path>, branch: &str, file: &str) -> Option<String> {
        let repos = self.repos.read().ok()?;
        let contents = repos.get(repo.as_ref())?.branches.get(branch)?.get(file)?;
        Some(String::from_utf8_lossy(contents).into_owned())
    }

    fn record(&self, call: String) -> ExperimentResult<()> {
        self.calls.write().map_err(poisoned)?.push(call);
        Ok(())
    }

    fn with_repo<T>(
        &self,
        repo: &Path,
        call: &str,
        f: impl FnOnce(&mut Repo) -> ExperimentResult<T>,
    ) -> ExperimentResult<T> {
        let mut repos = self.repos.write().map_err(poisoned)?;
        let state = repos
            .get_mut(repo)
            .ok_or_else(|| vcs_error(call, format!("{} is not a repository", repo.display())))?;
        f(state)
    }
}

impl VersionControl for InMemoryVcs {
    fn clone_repository(&self, url: &str, dest: &Path, branch: Option<&str>) -> ExperimentResult<()> {
        let call = format!("clone {url} {}", dest.display());
        self.record(call.clone())?;

        let source = Path::new(url);
        let snapshot = {
            let repos = self.repos.read().map_err(poisoned)?;
            match repos.get(source) {
                Some(origin) => {
                    let wanted = branch.unwrap_or(&origin.head);
                    origin
                        .branches
                        .get(wanted)
                        .cloned()
                        .ok_or_else(|| vcs_error(&call, format!("remote branch {wanted} not found")))?
                }
                None if source.is_dir() => snapshot_dir(source)?,
                None => return Err(vcs_error(&call, format!("repository {url} does not exist"))),
            }
        };
        for (name, contents) in &snapshot {
            write_file(&dest.join(name), contents)?;
        }

        let head = branch.unwrap_or("main").to_string();
        let mut repos = self.repos.write().map_err(poisoned)?;
        repos.insert(
            dest.to_path_buf(),
            Repo {
                branches: BTreeMap::from([(head.clone(), snapshot)]),
                head,
                commits: Vec::new(),
            },
        );
        Ok(())
    }

    fn local_branches(&self, repo: &Path) -> ExperimentResult<Vec<String>> {
        self.with_repo(repo, "branch", |r| Ok(r.branches.keys().cloned().collect()))
    }

    fn checkout(&self, repo: &Path, branch: &str, create_from: Option<&str>) -> ExperimentResult<()> {
        let call = match create_from {
            Some(start) => format!("checkout -b {branch} {start}"),
            None => format!("checkout {branch}"),
        };
        self.record(call.clone())?;

        self.with_repo(repo, &call, |r| {
            if let Some(start) = create_from {
                if r.branches.contains_key(branch) {
                    return Err(vcs_error(&call, format!("a branch named '{branch}' already exists")));
                }
                let start = if start == "HEAD" { r.head.as_str() } else { start };
                let snapshot = r
                    .branches
                    .get(start)
                    .cloned()
                    .ok_or_else(|| vcs_error(&call, format!("'{start}' is not a commit")))?;
                r.branches.insert(branch.to_string(), snapshot);
            }

            let target = r
                .branches
                .get(branch)
                .ok_or_else(|| vcs_error(&call, format!("pathspec '{branch}' did not match")))?;
            if let Some(current) = r.branches.get(&r.head) {
                for name in current.keys().filter(|n| !target.contains_key(*n)) {
                    let path = repo.join(name);
                    if path.exists() {
                        fs::remove_file(&path).map_err(|e| ExperimentError::io(&path, e))?;
                    }
                }
            }
            for (name, contents) in target {
                write_file(&repo.join(name), contents)?;
            }
            r.head = branch.to_string();
            Ok(())
        })
    }

    fn modified_files(&self, repo: &Path) -> ExperimentResult<Vec<String>> {
        self.record("diff --name-only".into())?;
        self.with_repo(repo, "diff", |r| {
            let Some(committed) = r.branches.get(&r.head) else {
                return Ok(Vec::new());
            };
            Ok(committed
                .iter()
                .filter(|(name, contents)| fs::read(repo.join(name)).ok().as_ref() != Some(*contents))
                .map(|(name, _)| name.clone())
                .collect())
        })
    }

    fn commit(&self, repo: &Path, message: &str, files: &[String]) -> ExperimentResult<()> {
        self.record(format!("commit -m {message}"))?;
        self.with_repo(repo, "commit", |r| {
            let head = r.head.clone();
            let snapshot = r.branches.entry(head.clone()).or_default();
            for name in files {
                match fs::read(repo.join(name)) {
                    Ok(contents) => {
                        snapshot.insert(name.clone(), contents);
                    }
                    Err(_) => {
                        snapshot.remove(name);
                    }
                }
            }
            r.commits.push(CommitRecord {
                branch: head,
                message: message.to_string(),
                files: files.to_vec(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("origin");
        write_file(&origin.join("config.yaml"), b"queue: normal\n").unwrap();
        write_file(&origin.join("ocean/input.nml"), b"&ocean_model_nml\n/\n").unwrap();
        write_file(&origin.join(".git/HEAD"), b"ref: refs/heads/main\n").unwrap();
        (tmp, origin)
    }

    #[test]
    fn clone_copies_files_without_git_dir() {
        let (tmp, origin) = origin();
        let vcs = InMemoryVcs::new();
        let dest = tmp.path().join("work");

        vcs.clone_repository(origin.to_str().unwrap(), &dest, Some("dev")).unwrap();

        assert_eq!(fs::read_to_string(dest.join("ocean/input.nml")).unwrap(), "&ocean_model_nml\n/\n");
        assert!(!dest.join(".git").exists());
        assert_eq!(vcs.local_branches(&dest).unwrap(), vec!["dev"]);
        assert_eq!(vcs.current_branch(&dest).as_deref(), Some("dev"));
    }

    #[test]
    fn branches_keep_separate_contents() {
        let (_tmp, repo) = origin();
        let vcs = InMemoryVcs::new();
        vcs.init(&repo, "main").unwrap();

        vcs.checkout(&repo, "ctrl", Some("HEAD")).unwrap();
        fs::write(repo.join("config.yaml"), "queue: express\n").unwrap();
        assert_eq!(vcs.modified_files(&repo).unwrap(), vec!["config.yaml"]);
        vcs.commit(&repo, "ctrl change", &["config.yaml".to_string()]).unwrap();
        assert!(vcs.modified_files(&repo).unwrap().is_empty());

        vcs.checkout(&repo, "main", None).unwrap();
        assert_eq!(fs::read_to_string(repo.join("config.yaml")).unwrap(), "queue: normal\n");
        assert_eq!(
            vcs.committed_file(&repo, "ctrl", "config.yaml").as_deref(),
            Some("queue: express\n")
        );
        assert!(vcs.has_branch(&repo, "ctrl").unwrap());
        assert_eq!(vcs.commits(&repo)[0].branch, "ctrl");
    }

    #[test]
    fn checkout_errors() {
        let (_tmp, repo) = origin();
        let vcs = InMemoryVcs::new();
        vcs.init(&repo, "main").unwrap();

        assert!(vcs.checkout(&repo, "missing", None).is_err());
        assert!(vcs.checkout(&repo, "main", Some("HEAD")).is_err());
        assert!(vcs.checkout(&repo, "new", Some("nowhere")).is_err());
        assert!(vcs.local_branches(Path::new("/not/tracked")).is_err());
        assert_eq!(
            vcs.calls(),
            vec!["checkout missing", "checkout -b main HEAD", "checkout -b new nowhere"]
        );
    }
}
