//! Subcommands

pub mod beacon;
pub mod config;
pub mod dump;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use efdump_gnd::dump::dedup_inputs;

/// Input selection shared by `dump` and `beacon`
#[derive(Args, Debug, Default)]
pub struct InputArgs {
    /// Input file (repeatable)
    #[arg(short, long = "input", value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Process every matching file in this folder
    #[arg(short, long, value_name = "DIR")]
    pub folder: Option<PathBuf>,

    /// File name pattern used with --folder (default depends on mode)
    #[arg(long, value_name = "GLOB", requires = "folder")]
    pub pattern: Option<String>,
}

impl InputArgs {
    /// Explicit files first, then folder matches in name order.
    pub fn resolve(&self, default_patterns: &[&str]) -> Result<Vec<PathBuf>> {
        let mut inputs = self.inputs.clone();
        if let Some(folder) = &self.folder {
            anyhow::ensure!(folder.is_dir(), "Not a directory: {}", folder.display());
            let patterns: Vec<&str> = match &self.pattern {
                Some(p) => vec![p.as_str()],
                None => default_patterns.to_vec(),
            };
            let mut found = Vec::new();
            for pattern in patterns {
                found.extend(glob_files(folder, pattern)?);
            }
            found.sort();
            log::info!("{} input files found in {}", found.len(), folder.display());
            inputs.extend(found);
        }

        for path in &inputs {
            anyhow::ensure!(path.is_file(), "Input file not found: {}", path.display());
        }
        let inputs = dedup_inputs(inputs);
        anyhow::ensure!(!inputs.is_empty(), "No input files (use --input or --folder)");
        Ok(inputs)
    }
}

fn glob_files(folder: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = folder.join(pattern);
    let full = full
        .to_str()
        .with_context(|| format!("Folder path is not valid UTF-8: {}", folder.display()))?;
    let mut files = Vec::new();
    for entry in glob::glob(full).with_context(|| format!("Invalid pattern: {pattern}"))? {
        let path = entry.context("Cannot read folder entry")?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Remove stale `.tmp` files next to where `output_template` resolves.
pub fn clean_output_dir(output_template: &str) -> Result<()> {
    let dir = Path::new(output_template)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if dir.is_dir() {
        efdump_core::cleanup_tmp_files(dir)
            .with_context(|| format!("Cannot clean {}", dir.display()))?;
    }
    Ok(())
}

/// 130 when interrupted, 1 when anything failed, else 0
pub fn exit_code(failed: bool, interrupted: bool) -> ExitCode {
    if interrupted {
        ExitCode::from(130)
    } else if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
