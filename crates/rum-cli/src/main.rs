use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rum_cli::commands::{compute, config, replay, track};
use rum_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Opens `path`, or stdin when no path is given.
fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so JSONL output stays machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();
    match &cli.command {
        Some(Commands::Compute { input }) => {
            let processed = compute::run(open_input(input.as_deref())?, &mut stdout)?;
            tracing::debug!(processed, "timing records computed");
        }
        Some(Commands::Track {
            url,
            without_resources,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            track::run(&mut stdout, &config, url, *without_resources)?;
        }
        Some(Commands::Replay {
            input,
            time_origin,
            seed,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let options = replay::ReplayOptions {
                time_origin: *time_origin,
                seed: *seed,
            };
            let summary = replay::run(open_input(input.as_deref())?, &mut stdout, &config, options)?;
            tracing::info!(
                observations = summary.observations,
                collected = summary.collected,
                "replay finished"
            );
        }
        Some(Commands::Config) => {
            let config = load_config(cli.config.as_deref())?;
            config::run(&mut stdout, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
