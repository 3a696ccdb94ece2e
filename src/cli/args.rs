// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for labforge

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labforge")]
#[command(about = "Dependency-ordered parallel task orchestration with retries and rollback")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a plan from a YAML file
    Run {
        #[arg(help = "Path to plan YAML file")]
        plan: PathBuf,

        #[arg(long, help = "Maximum number of concurrent tasks")]
        max_concurrent: Option<usize>,

        #[arg(short, long, help = "Write the execution report to this file (JSON)")]
        output: Option<PathBuf>,

        #[arg(
            long,
            help = "On failure, roll back these components in order (repeatable)"
        )]
        rollback: Vec<String>,
    },

    /// Validate a plan file without executing
    Validate {
        #[arg(help = "Path to plan YAML file")]
        plan: PathBuf,
    },

    /// Render a previously written execution report
    Report {
        #[arg(help = "Path to a JSON report written by `run --output`")]
        report: PathBuf,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
