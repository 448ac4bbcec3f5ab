//! Logging utilities with indicatif integration

use indicatif::MultiProgress;

/// Crates whose chatter is capped at warn unless RUST_LOG says otherwise
const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Logger that prints through indicatif MultiProgress to avoid mixing with progress bars.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            // Only used on a TTY, so always colored
            let (pre, label, post) = level_style(record.level(), true);
            let line = format!("[{pre}{label}{post}] {}", record.args());
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn default_filter(quiet: bool, debug: bool) -> String {
    let level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let mut filter = level.to_string();
    for module in NOISY_MODULES {
        filter.push_str(&format!(",{module}=warn"));
    }
    filter
}

fn builder(quiet: bool, debug: bool) -> env_logger::Builder {
    let filter = default_filter(quiet, debug);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
}

/// Initialize logging with optional TTY mode (indicatif integration).
///
/// Fails only if a global logger is already installed.
pub fn init_logging(
    quiet: bool,
    debug: bool,
    multi: Option<&MultiProgress>,
) -> Result<(), log::SetLoggerError> {
    use std::io::Write;

    if let Some(multi) = multi {
        let logger = builder(quiet, debug).build();
        let max_level = logger.filter();
        log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone())))?;
        log::set_max_level(max_level);
    } else {
        // Non-TTY: no ANSI colors, timestamp for log aggregation
        builder(quiet, debug)
            .format(|buf, record| {
                let (_, label, _) = level_style(record.level(), false);
                writeln!(buf, "{} [{label}] {}", buf.timestamp_millis(), record.args())
            })
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_levels() {
        assert!(default_filter(false, false).starts_with("info,"));
        assert!(default_filter(true, false).starts_with("warn,"));
        assert!(default_filter(true, true).starts_with("debug,"));
    }

    #[test]
    fn filter_caps_http_stack() {
        let f = default_filter(false, true);
        assert!(f.contains("hyper=warn"));
        assert!(f.contains("reqwest=warn"));
    }

    #[test]
    fn plain_labels_have_no_ansi() {
        let (pre, label, post) = level_style(log::Level::Warn, false);
        assert_eq!((pre, label, post), ("", "WARN ", ""));
    }
}
