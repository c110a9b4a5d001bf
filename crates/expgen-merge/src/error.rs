//! Error types for the merge crate.

use expgen_types::Marker;

/// Errors that abort a merge call.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A positional marker points past the end of the baseline list.
    #[error(
        "{path}[{index}]: {marker} refers to a non-existent baseline slot \
         (baseline length={baseline_len}); check the number of REMOVE/PRESERVE markers"
    )]
    MarkerOutOfRange {
        path: String,
        index: usize,
        marker: Marker,
        baseline_len: usize,
    },

    /// The change and base trees have irreconcilable shapes.
    #[error("type mismatch at {path:?}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A persisted baseline snapshot is not a list.
    #[error("corrupt remove-state entry {key}: baseline snapshot is not a list")]
    CorruptBaseline { key: String },
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
