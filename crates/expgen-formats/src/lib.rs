//! Configuration file adapters for expgen.
//!
//! Every supported file is parsed into a [`serde_json::Value`] mapping so the
//! merge engine sees one tree shape regardless of the on-disk format, and is
//! rendered back after the merge.
//!
//! # Modules
//!
//! - [`traits`] -- The [`ConfigFormat`] trait
//! - [`yaml`] -- YAML documents ([`YamlFormat`])
//! - [`json`] -- JSON documents ([`JsonFormat`])
//! - [`namelist`] -- Fortran namelists, rendered by patching the original text
//! - [`field_table`] -- MOM `field_table` files
//! - [`kind`] -- [`FileKind`]: which adapter handles which file

pub mod error;
pub mod field_table;
pub mod json;
pub mod kind;
pub mod namelist;
pub mod traits;
pub mod yaml;

pub use error::{FormatError, FormatResult};
pub use field_table::FieldTableFormat;
pub use json::JsonFormat;
pub use kind::FileKind;
pub use namelist::NamelistFormat;
pub use traits::ConfigFormat;
pub use yaml::YamlFormat;
