//! Structural merge engine for expgen.
//!
//! Applies a sparse [`ChangeValue`](expgen_types::ChangeValue) tree onto a
//! configuration tree parsed from any supported file format, honouring the
//! `REMOVE` and `PRESERVE` markers. List merges are positional and read from
//! a baseline snapshot persisted in a [`RemoveState`](expgen_types::RemoveState),
//! so re-applying an unchanged change tree to an already-merged base is a
//! no-op even after earlier removals shifted list indices.
//!
//! # Modules
//!
//! - [`preserve`] -- [`strip_preserved`]: resolve `PRESERVE` before applying
//! - [`clean`] -- [`clean_removes`]: resolve `REMOVE` into absence or null
//! - [`positional`] -- [`merge_lists_positional`]: baseline-stable list merge
//! - [`engine`] -- [`update_config_entries`] and the transactional [`merge`]
//!
//! # Empty containers
//!
//! With `pop_key` set, a mapping or sequence that ends up empty is dropped
//! from its parent instead of being kept as `{}` / `[]`.

pub mod clean;
pub mod engine;
pub mod error;
pub mod positional;
pub mod preserve;

pub use clean::clean_removes;
pub use engine::{merge, update_config_entries};
pub use error::{MergeError, MergeResult};
pub use positional::merge_lists_positional;
pub use preserve::strip_preserved;
