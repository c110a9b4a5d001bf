//! Foundation types for expgen.
//!
//! Configuration files are parsed into plain [`serde_json::Value`] trees.
//! Change specifications authored by users share that shape, but may also
//! carry two control markers at any scalar position. This crate gives the
//! change side its own closed type so the merge engine never has to compare
//! against magic strings.
//!
//! # Key Types
//!
//! - [`ChangeValue`] -- A change tree: mapping, sequence, scalar, or [`Marker`]
//! - [`Marker`] -- The `REMOVE` / `PRESERVE` control markers
//! - [`RemoveState`] -- Baseline snapshots and positional removal records,
//!   keyed by structural path
//!
//! # Paths
//!
//! Structural paths join mapping keys with `.` and list indices as `[i]`,
//! e.g. `field_table.temp.ocean_mod.prog_tracers.methods[2]`. See [`path`].

pub mod change;
pub mod path;
pub mod state;

pub use change::{is_preserved, is_removed, is_sequence, ChangeValue, Marker};
pub use path::{base_state_key, index_segment, path_join, remove_state_key};
pub use state::RemoveState;
