use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use expgen_experiment::DEFAULT_INPUT_FILE;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "expgen",
    about = "Generate control and perturbation experiments on branches of a model configuration repository",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log debug output, including diffs of rewritten files
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply the control experiment and generate perturbation branches
    Run(RunArgs),
    /// Print the perturbation runs an input file expands to
    Expand(ExpandArgs),
    /// Print the remove state recorded for a target
    State(StateArgs),
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(default_value = DEFAULT_INPUT_FILE)]
    pub input: PathBuf,
}

#[derive(Args)]
pub struct ExpandArgs {
    #[arg(default_value = DEFAULT_INPUT_FILE)]
    pub input: PathBuf,
}

#[derive(Args)]
pub struct StateArgs {
    /// Control branch name or `<block>/<run>` perturbation branch
    pub target: String,
    /// Directory holding the `.remove_state` directory (the input's test_path)
    #[arg(long, default_value = "experiment_generator_test_path")]
    pub root: PathBuf,
}
