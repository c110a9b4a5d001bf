//! Remove-state persistence for expgen.
//!
//! One [`RemoveState`](expgen_types::RemoveState) exists per target (usually
//! one experiment branch). It is loaded before a merge, mutated by the merge
//! engine, and saved afterwards so that the next run reads list indices from
//! the same baselines.
//!
//! # Modules
//!
//! - [`error`] -- Error types for state operations
//! - [`traits`] -- The [`StateStore`] trait
//! - [`names`] -- Target name validation
//! - [`file`] -- [`FileStateStore`], one pretty-printed JSON file per target
//! - [`memory`] -- [`InMemoryStateStore`] for tests

pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod traits;

pub use error::{StateError, StateResult};
pub use file::{FileStateStore, DEFAULT_STATE_DIRNAME};
pub use memory::InMemoryStateStore;
pub use names::validate_target_name;
pub use traits::StateStore;
