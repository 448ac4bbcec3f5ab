//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use efdump_core::{HttpConfig, PoolConfig, RetryPolicy};
use efdump_gnd::client::DEFAULT_URL_TEMPLATE;
use efdump_gnd::config::{
    DEFAULT_BEACON_TEMPLATE, DEFAULT_DUMP_TEMPLATE, DEFAULT_LANGUAGE, DEFAULT_PARALLEL_FILES,
};
use serde::Deserialize;

/// Global configuration for efdump
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub http: HttpSettings,
    pub workers: WorkersConfig,
    pub output: OutputConfig,
    pub languages: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            http: HttpSettings::default(),
            workers: WorkersConfig::default(),
            output: OutputConfig::default(),
            languages: vec![DEFAULT_LANGUAGE.to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// `{ID}` is replaced by the identifier; without it the identifier is appended
    pub url_template: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let http = HttpConfig::default();
        let retry = RetryPolicy::default();
        Self {
            connect_timeout_secs: http.connect_timeout.as_secs(),
            request_timeout_secs: http.request_timeout.as_secs(),
            max_retries: retry.max_retries,
            retry_delay_ms: retry.delay.as_millis() as u64,
            user_agent: None,
        }
    }
}

impl HttpSettings {
    pub fn http_config(&self) -> HttpConfig {
        let mut config = HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..HttpConfig::default()
        };
        if let Some(ua) = &self.user_agent {
            config.user_agent = ua.clone();
        }
        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub threads: usize,
    pub max_submitted: usize,
    pub monitor_interval_secs: u64,
    /// Input files decoded concurrently
    pub parallel_files: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            threads: pool.workers,
            max_submitted: pool.max_submitted,
            monitor_interval_secs: efdump_core::monitor::DEFAULT_MONITOR_INTERVAL.as_secs(),
            parallel_files: DEFAULT_PARALLEL_FILES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dump_template: String,
    pub beacon_template: String,
    pub faulty_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dump_template: DEFAULT_DUMP_TEMPLATE.to_string(),
            beacon_template: DEFAULT_BEACON_TEMPLATE.to_string(),
            faulty_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./efdump.toml (current directory)
    /// 2. ~/.config/efdump/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("efdump.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "efdump") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
