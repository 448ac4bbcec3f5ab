//! Dump subcommand - fetch Entity Facts documents per language

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use efdump_core::{PoolConfig, SharedProgress};
use efdump_gnd::{DumpConfig, EntityFactsClient, run_dump};

use super::InputArgs;
use crate::config::Config;

/// Folder patterns when no --pattern is given
const DUMP_PATTERNS: &[&str] = &["*.ttl.gz", "*.nt.gz", "*.csv", "*.txt"];

#[derive(Args, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output path template ({TIMESTAMP}, {LANG})
    #[arg(short, long)]
    pub output: Option<String>,

    /// Languages to fetch (comma-separated, e.g. de-DE,en-US)
    #[arg(short, long, value_delimiter = ',')]
    pub languages: Option<Vec<String>>,

    /// Number of concurrent lookups
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Maximum lookups queued, running or awaiting retry
    #[arg(long)]
    pub max_submitted: Option<usize>,

    /// Retries per lookup after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Delay before a failed lookup is retried
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Entity Facts URL template ({ID})
    #[arg(long)]
    pub url: Option<String>,

    /// Save unparseable response bodies here
    #[arg(long)]
    pub faulty_dir: Option<PathBuf>,

    /// Input files decoded concurrently
    #[arg(long)]
    pub parallel_files: Option<usize>,

    /// Remove leftover .tmp files in the output directory first
    #[arg(long)]
    pub clean: bool,
}

impl DumpArgs {
    /// File settings overridden by flags
    fn into_config(self, config: &Config) -> Result<DumpConfig> {
        let mut retry = config.http.retry_policy();
        if let Some(n) = self.max_retries {
            retry.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            retry.delay = Duration::from_millis(ms);
        }

        Ok(DumpConfig {
            inputs: self.input.resolve(DUMP_PATTERNS)?,
            output_template: self
                .output
                .unwrap_or_else(|| config.output.dump_template.clone()),
            languages: self.languages.unwrap_or_else(|| config.languages.clone()),
            url_template: self
                .url
                .unwrap_or_else(|| config.service.url_template.clone()),
            http: config.http.http_config(),
            pool: PoolConfig {
                name: "fetch".to_string(),
                workers: self.workers.unwrap_or(config.workers.threads),
                max_submitted: self.max_submitted.unwrap_or(config.workers.max_submitted),
            },
            retry,
            monitor_interval: Duration::from_secs(config.workers.monitor_interval_secs.max(1)),
            parallel_files: self.parallel_files.unwrap_or(config.workers.parallel_files),
            faulty_dir: self.faulty_dir.or_else(|| config.output.faulty_dir.clone()),
        })
    }
}

pub fn run(args: DumpArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let clean = args.clean;
    let dump = args.into_config(config)?;
    dump.validate()?;
    if clean {
        super::clean_output_dir(&dump.output_template)?;
    }

    let client = EntityFactsClient::new(&dump.url_template, &dump.http)
        .with_context(|| format!("Invalid service URL template: {}", dump.url_template))?;
    let summary = run_dump(&dump, Arc::new(client), progress)?;

    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }
    Ok(super::exit_code(!summary.is_success(), summary.interrupted))
}
