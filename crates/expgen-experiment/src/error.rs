use std::path::PathBuf;

use expgen_formats::FormatError;
use expgen_merge::MergeError;
use expgen_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("invalid experiment configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid model type {model:?}: must be one of {valid:?}")]
    InvalidModel {
        model: String,
        valid: &'static [&'static str],
    },

    /// A per-run list is shorter than the number of runs in its block.
    #[error("{path}: no value for run {index}, the list has {len} entries")]
    RunIndexOutOfRange { path: String, index: usize, len: usize },

    /// A change tree is malformed for the file it targets.
    #[error("{file}: {message}")]
    InvalidChange { file: String, message: String },

    #[error("{file}: merge failed: {source}")]
    Merge {
        file: String,
        #[source]
        source: MergeError,
    },

    #[error("{file}: {source}")]
    Format {
        file: String,
        #[source]
        source: FormatError,
    },

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("git {args} failed: {message}")]
    Vcs { args: String, message: String },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ExperimentError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ExperimentResult<T> = std::result::Result<T, ExperimentError>;
