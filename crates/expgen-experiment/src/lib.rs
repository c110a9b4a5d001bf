//! Experiment generation for expgen.
//!
//! Reads the experiment input file, applies the control experiment to a
//! branch of the configuration repository, then expands each perturbation
//! block into one branch per run and applies its changes there.
//!
//! # Modules
//!
//! - [`config`] -- [`ExperimentConfig`], the experiment input file
//! - [`definition`] -- perturbation block expansion into [`ExperimentDefinition`]s
//! - [`forcing`] -- validation of `forcing.json` changes
//! - [`updater`] -- [`ConfigUpdater`]: parse, merge, and rewrite one target's files
//! - [`diff`] -- line statistics and unified diffs of rewritten files
//! - [`vcs`] -- the [`VersionControl`] collaborator, [`GitCli`] and [`InMemoryVcs`]
//! - [`generator`] -- [`ExperimentGenerator`]: control and perturbation runs

pub mod config;
pub mod definition;
pub mod diff;
pub mod error;
pub mod forcing;
pub mod generator;
pub mod updater;
pub mod vcs;

pub use config::{ExperimentConfig, DEFAULT_INPUT_FILE, VALID_MODELS};
pub use definition::{collect_experiment_definitions, extract_run_specific_params, ExperimentDefinition};
pub use diff::{diff_stat, unified_diff, DiffStat};
pub use error::{ExperimentError, ExperimentResult};
pub use forcing::prepare_forcing_change;
pub use generator::{ExperimentGenerator, FileChange, RunReport, TargetOutcome, EXCLUDED_DIRS};
pub use updater::{ConfigUpdater, FileUpdate};
pub use vcs::{CommitRecord, GitCli, InMemoryVcs, VersionControl};
