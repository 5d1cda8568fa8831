//! CLI command definitions and handlers

mod doctor;
mod scan;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Scanforge - security scan orchestration
#[derive(Parser, Debug)]
#[command(name = "scanforge")]
#[command(
    version,
    about = "Run external security analyzers against a project and aggregate their findings",
    after_help = "\
Examples:
  scanforge scan .                       Scan current directory
  scanforge scan /path/to/repo --format json   JSON output for scripting
  scanforge scan . --fail-on HIGH        Exit non-zero if HIGH+ findings (CI mode)
  scanforge doctor                       Show which analyzers are installed"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a project with every available analyzer
    Scan {
        /// Path to the project to scan
        path: PathBuf,

        /// Output format
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Exit with an error if a finding at or above this severity exists
        #[arg(long, value_parser = ["LOW", "MEDIUM", "HIGH", "CRITICAL"])]
        fail_on: Option<String>,

        /// Number of parallel tool workers (1-64)
        #[arg(long, value_parser = parse_workers)]
        workers: Option<usize>,

        /// Suppress live progress output
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Check which analysis tools are installed
    Doctor,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scan {
            path,
            format,
            output,
            fail_on,
            workers,
            quiet,
        } => scan::run(path, &format, output, fail_on, workers, quiet),
        Commands::Doctor => doctor::run(),
    }
}
