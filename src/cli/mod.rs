//! Command-line interface definitions.

pub mod check;
pub mod output;
pub mod simulate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rentsync - resilient remote calls and optimistic collection sync.
#[derive(Parser, Debug)]
#[command(name = "rentsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and print the effective settings
    Check(ConfigPathArg),

    /// Run a scripted session against the in-memory backend
    Simulate(SimulateArgs),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Network failures injected on `createProperty`
    #[arg(long, default_value = "3")]
    pub failures: usize,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
