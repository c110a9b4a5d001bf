use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::VersionControl;
use crate::error::{ExperimentError, ExperimentResult};

/// [`VersionControl`] backed by the `git` executable.
#[derive(Clone, Debug)]
pub struct GitCli {
    program: OsString,
}

impl GitCli {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use another executable, e.g. an absolute path to git.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git with `args`, inside `repo` when given. Returns stdout without
    /// its trailing newline.
    fn run<I, S>(&self, repo: Option<&Path>, args: I) -> ExperimentResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut argv: Vec<OsString> = Vec::new();
        if let Some(repo) = repo {
            argv.push("-C".into());
            argv.push(repo.as_os_str().to_owned());
        }
        argv.extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        let shown = argv
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(args = %shown, "git");

        let output = Command::new(&self.program)
            .args(&argv)
            .output()
            .map_err(|e| ExperimentError::Vcs {
                args: shown.clone(),
                message: format!("could not run {:?}: {e}", self.program),
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let mut message = String::new();
            if !stdout.is_empty() {
                message.push_str(&format!("stdout: {stdout}"));
            }
            if !stderr.is_empty() {
                message.push_str(&format!("stderr: {stderr}"));
            }
            return Err(ExperimentError::Vcs {
                args: shown,
                message: chomp(message),
            });
        }
        Ok(chomp(stdout))
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

fn chomp(text: String) -> String {
    text.strip_suffix("\r\n")
        .or(text.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(text)
}

fn lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl VersionControl for GitCli {
    fn clone_repository(&self, url: &str, dest: &Path, branch: Option<&str>) -> ExperimentResult<()> {
        let mut args: Vec<OsString> = vec!["clone".into()];
        if let Some(branch) = branch {
            args.push("--branch".into());
            args.push(branch.into());
        }
        args.push(url.into());
        args.push(dest.as_os_str().to_owned());
        self.run(None, args)?;
        Ok(())
    }

    fn local_branches(&self, repo: &Path) -> ExperimentResult<Vec<String>> {
        let out = self.run(
            Some(repo),
            ["for-each-ref", "--format=%(refname:short)", "refs/heads/"],
        )?;
        Ok(lines(&out))
    }

    fn checkout(&self, repo: &Path, branch: &str, create_from: Option<&str>) -> ExperimentResult<()> {
        match create_from {
            Some(start) => self.run(Some(repo), ["checkout", "-b", branch, start])?,
            None => self.run(Some(repo), ["checkout", branch])?,
        };
        Ok(())
    }

    fn modified_files(&self, repo: &Path) -> ExperimentResult<Vec<String>> {
        let out = self.run(Some(repo), ["diff", "--name-only"])?;
        Ok(lines(&out))
    }

    fn commit(&self, repo: &Path, message: &str, files: &[String]) -> ExperimentResult<()> {
        let mut add = vec!["add", "--"];
        add.extend(files.iter().map(String::as_str));
        self.run(Some(repo), add)?;
        self.run(Some(repo), ["commit", "-m", message])?;
        Ok(())
    }
}
