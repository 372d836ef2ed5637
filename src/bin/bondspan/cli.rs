use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bondspan",
    about = "Bonded-topology migration demo and introspection harness",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Enable debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Drive a scripted multi-rank migration scenario and print the
    /// resulting per-rank topology
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file (TOML); a built-in two-rank chain if omitted
    #[arg(short, long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Print every resolved relationship, not just the counts
    #[arg(long)]
    pub resolved: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
