//! efdump - Entity Facts enrichment for the GND authority file
//!
//! Fetches Entity Facts documents for every accepted GND entity in one or
//! more languages, or derives a BEACON file of deprecated identifiers.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use efdump_core::{ProgressContext, SharedProgress};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "efdump")]
#[command(about = "Entity Facts enrichment for the GND authority file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./efdump.toml or ~/.config/efdump/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch Entity Facts documents for every accepted entity
    Dump(cmd::dump::DumpArgs),
    /// Write deprecated → primary identifier redirects as BEACON
    Beacon(cmd::beacon::BeaconArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress: SharedProgress = Arc::new(ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --quiet, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    if let Err(e) = efdump_core::init_logging(quiet, cli.debug, multi) {
        eprintln!("Logger initialisation failed: {e}");
    }

    if let Err(e) = efdump_core::install_signal_handlers() {
        log::warn!("Signal handlers not installed: {e}");
    }

    match run(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, progress: &SharedProgress) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Dump(args) => cmd::dump::run(args, &config, progress),
        Command::Beacon(args) => cmd::beacon::run(args, &config, progress),
        Command::Config => {
            cmd::config::run(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
