//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Offline tooling for the browser RUM agent.
///
/// Computes resource timing details, checks which URLs the agent reports and
/// replays recorded observations through the agent.
#[derive(Debug, Parser)]
#[command(name = "rum", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute duration and phase details for JSONL timing records.
    Compute {
        /// Read records from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print whether a resource URL would be reported.
    Track {
        /// The resource URL.
        url: String,

        /// Check against a session that does not collect resources.
        #[arg(long)]
        without_resources: bool,
    },

    /// Replay JSONL observations through the agent and print collected events.
    Replay {
        /// Read observations from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Navigation origin (RFC 3339); defaults to now.
        #[arg(long)]
        time_origin: Option<DateTime<Utc>>,

        /// Seed for session sampling.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the effective configuration.
    Config,
}
