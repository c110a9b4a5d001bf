//! Error types for parsing and rendering configuration files.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed namelist text. `line` is 1-based.
    #[error("namelist line {line}: {message}")]
    Namelist { line: usize, message: String },

    /// Malformed field table text. `line` is 1-based.
    #[error("field table line {line}: {message}")]
    FieldTable { line: usize, message: String },

    /// The document parsed, but its top level is not a mapping.
    #[error("{format} document must be a mapping at the top level, found {found}")]
    NotAMapping { format: &'static str, found: &'static str },

    /// A merged tree holds a value the format has no way to write.
    #[error("{format}: cannot write {path}: {message}")]
    Unrepresentable {
        format: &'static str,
        path: String,
        message: String,
    },
}

pub type FormatResult<T> = std::result::Result<T, FormatError>;
