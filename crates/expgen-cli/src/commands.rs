use colored::Colorize;
use expgen_experiment::{
    collect_experiment_definitions, ExperimentConfig, ExperimentGenerator, RunReport, TargetOutcome,
};
use expgen_state::{FileStateStore, StateStore};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args, &cli.format),
        Command::Expand(args) => cmd_expand(args, &cli.format),
        Command::State(args) => cmd_state(args, &cli.format),
    }
}

fn cmd_run(args: RunArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = ExperimentConfig::load(&args.input)?;
    let report = ExperimentGenerator::with_git(config).run()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    if report.failures() > 0 {
        anyhow::bail!("{} perturbation experiment(s) failed", report.failures());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("{}", "Control experiment".bold());
    print_outcome(&report.control);
    if !report.perturbations.is_empty() {
        println!("\n{}", "Perturbation experiments".bold());
        for outcome in &report.perturbations {
            print_outcome(outcome);
        }
    }
}

fn print_outcome(outcome: &TargetOutcome) {
    let name = outcome.branch.as_deref().unwrap_or(&outcome.target);
    if let Some(error) = &outcome.error {
        println!("{} {}: {}", "✗".red().bold(), name.yellow(), error);
        return;
    }
    match &outcome.commit {
        Some(_) => println!("{} {}", "✓".green(), name.yellow()),
        None => println!("{} {} {}", "✓".green(), name.yellow(), "(no changes)".dimmed()),
    }
    for change in &outcome.changed {
        println!(
            "    {} {} {}",
            change.file,
            format!("+{}", change.stat.additions).green(),
            format!("-{}", change.stat.deletions).red()
        );
    }
}

fn cmd_expand(args: ExpandArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = ExperimentConfig::load(&args.input)?;
    let definitions = match &config.perturbation_experiment {
        Some(blocks) => collect_experiment_definitions(blocks)?,
        None => Vec::new(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&definitions)?),
        OutputFormat::Text => {
            if definitions.is_empty() {
                println!("No perturbation experiments.");
            }
            for definition in &definitions {
                println!("{}", definition.branch_name.yellow().bold());
                for (file, params) in &definition.file_params {
                    println!("  {}: {}", file.cyan(), serde_json::to_string(params)?);
                }
            }
        }
    }
    Ok(())
}

fn cmd_state(args: StateArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let store = FileStateStore::new(&args.root);
    let state = store.load(&args.target)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text => {
            if state.is_empty() {
                println!("No remove state recorded for {}.", args.target.yellow());
            }
            for (key, value) in state.iter() {
                println!("{} = {}", key.bold(), serde_json::to_string(value)?);
            }
        }
    }
    Ok(())
}
