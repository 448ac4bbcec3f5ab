//! Beacon subcommand - deprecated identifier redirects

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use efdump_core::SharedProgress;
use efdump_gnd::{BeaconConfig, run_beacon};

use super::InputArgs;
use crate::config::Config;

const BEACON_PATTERNS: &[&str] = &["*.ttl.gz", "*.nt.gz"];

#[derive(Args, Debug)]
pub struct BeaconArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output path template ({TIMESTAMP})
    #[arg(short, long)]
    pub output: Option<String>,

    /// Input files aggregated concurrently
    #[arg(long)]
    pub parallel_files: Option<usize>,

    /// Drop the last subject's redirects at end of each file
    #[arg(long)]
    pub no_flush_trailing: bool,

    /// Remove leftover .tmp files in the output directory first
    #[arg(long)]
    pub clean: bool,
}

pub fn run(args: BeaconArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let beacon = BeaconConfig {
        inputs: args.input.resolve(BEACON_PATTERNS)?,
        output_template: args
            .output
            .unwrap_or_else(|| config.output.beacon_template.clone()),
        parallel_files: args.parallel_files.unwrap_or(config.workers.parallel_files),
        flush_trailing: !args.no_flush_trailing,
    };
    if args.clean {
        super::clean_output_dir(&beacon.output_template)?;
    }

    let summary = run_beacon(&beacon, progress)?;
    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }
    Ok(super::exit_code(
        summary.failed_inputs() > 0,
        summary.interrupted,
    ))
}
