use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// idlewatch: powers an idle virtual machine off
///
/// Watches CPU usage and logged-in sessions, learns what "idle" means on
/// this machine, and shuts it down once it has been idle long enough.
#[derive(Parser, Debug)]
#[command(name = "idlewatch")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file [default: /etc/idlewatch/config.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the monitoring daemon
    #[command(alias = "d")]
    Run {
        /// Log the shutdown instead of powering off
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the calibration state
    #[command(alias = "s")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
