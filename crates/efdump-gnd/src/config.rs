//! Runtime configuration for dump and beacon runs

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use efdump_core::{HttpConfig, PoolConfig, RetryPolicy};

use crate::client::DEFAULT_URL_TEMPLATE;

/// Default dump file name
pub const DEFAULT_DUMP_TEMPLATE: &str = "{TIMESTAMP}-EFDump-{LANG}.json";

/// Default BEACON file name
pub const DEFAULT_BEACON_TEMPLATE: &str = "{TIMESTAMP}-GND-variantId-beacon.txt";

/// Language requested when none is configured
pub const DEFAULT_LANGUAGE: &str = "de-DE";

/// Input files decoded at the same time
pub const DEFAULT_PARALLEL_FILES: usize = 2;

/// Substitute `{TIMESTAMP}` (`YYYYMMDD`) and, if given, `{LANG}`.
pub fn resolve_template(template: &str, date: NaiveDate, language: Option<&str>) -> String {
    let out = template.replace("{TIMESTAMP}", &date.format("%Y%m%d").to_string());
    match language {
        Some(lang) => out.replace("{LANG}", lang),
        None => out,
    }
}

/// Make sure every language gets its own dump file.
///
/// With more than one language and no `{LANG}` placeholder, `-{LANG}` is
/// inserted before the last extension (`out.json` → `out-{LANG}.json`), or
/// appended when the file name has none.
pub fn normalize_dump_template(template: &str, languages: usize) -> String {
    if languages <= 1 || template.contains("{LANG}") {
        return template.to_string();
    }
    let name_start = template.rfind(['/', '\\']).map_or(0, |i| i + 1);
    match template[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = name_start + dot;
            format!("{}-{{LANG}}{}", &template[..dot], &template[dot..])
        }
        _ => format!("{template}-{{LANG}}"),
    }
}

/// Everything a dump run needs
#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub inputs: Vec<PathBuf>,
    /// Output path template (`{TIMESTAMP}`, `{LANG}`)
    pub output_template: String,
    pub languages: Vec<String>,
    pub url_template: String,
    pub http: HttpConfig,
    pub pool: PoolConfig,
    pub retry: RetryPolicy,
    pub monitor_interval: Duration,
    pub parallel_files: usize,
    /// Where raw bodies of unparseable responses are saved
    pub faulty_dir: Option<PathBuf>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_template: DEFAULT_DUMP_TEMPLATE.to_string(),
            languages: vec![DEFAULT_LANGUAGE.to_string()],
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            http: HttpConfig::default(),
            pool: PoolConfig {
                name: "fetch".to_string(),
                ..PoolConfig::default()
            },
            retry: RetryPolicy::default(),
            monitor_interval: efdump_core::monitor::DEFAULT_MONITOR_INTERVAL,
            parallel_files: DEFAULT_PARALLEL_FILES,
            faulty_dir: None,
        }
    }
}

impl DumpConfig {
    /// Check values that would otherwise fail mid-run.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.inputs.is_empty(), "No input files");
        anyhow::ensure!(!self.languages.is_empty(), "No languages requested");
        anyhow::ensure!(self.pool.workers > 0, "Worker count must be positive");
        anyhow::ensure!(
            self.pool.max_submitted > 0,
            "Maximum submitted tasks must be positive"
        );
        let mut seen = std::collections::HashSet::new();
        for lang in &self.languages {
            anyhow::ensure!(!lang.trim().is_empty(), "Empty language code");
            anyhow::ensure!(seen.insert(lang.as_str()), "Duplicate language: {lang}");
        }
        Ok(())
    }
}

/// Everything a beacon run needs
#[derive(Debug, Clone)]
pub struct BeaconConfig {
    pub inputs: Vec<PathBuf>,
    /// Output path template (`{TIMESTAMP}`)
    pub output_template: String,
    pub parallel_files: usize,
    /// Emit the last subject's group at end of each file
    pub flush_trailing: bool,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_template: DEFAULT_BEACON_TEMPLATE.to_string(),
            parallel_files: DEFAULT_PARALLEL_FILES,
            flush_trailing: true,
        }
    }
}
