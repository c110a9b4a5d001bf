//! Error types for remove-state storage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    /// The target name cannot be used as a state file name.
    #[error("invalid target name: {name:?}: {reason}")]
    InvalidTarget { name: String, reason: String },

    /// A state file exists but does not hold a JSON object.
    #[error("corrupt state file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StateResult<T> = std::result::Result<T, StateError>;
