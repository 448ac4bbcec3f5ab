//! Per-language output channels for dump mode.
//!
//! One JSON array document per requested language, opened before the first
//! task is submitted and shared by every worker.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use efdump_core::JsonArraySink;

use crate::config::resolve_template;

/// Live outcome counters for one language
#[derive(Debug, Default)]
pub struct LanguageStats {
    succeeded: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Outcome counts for one language at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LanguageCounts {
    /// Documents written
    pub succeeded: u64,
    /// Permanently refused by the service (not supported / not found)
    pub rejected: u64,
    /// Given up after retries, invalid URL, or write failure
    pub failed: u64,
    /// Retries scheduled
    pub retried: u64,
}

impl LanguageStats {
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LanguageCounts {
        LanguageCounts {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
        }
    }
}

/// Sink and counters for one language
#[derive(Debug)]
pub struct OutputChannel {
    pub language: String,
    pub sink: JsonArraySink,
    pub stats: LanguageStats,
}

/// Final state of one language's document
#[derive(Debug, Clone)]
pub struct LanguageReport {
    pub language: String,
    pub path: PathBuf,
    /// Elements in the closed document
    pub written: u64,
    pub counts: LanguageCounts,
    /// Set when the document could not be completed (left as `.tmp`)
    pub error: Option<String>,
}

/// All output channels of a dump run
#[derive(Debug)]
pub struct OutputChannels {
    channels: Vec<OutputChannel>,
}

impl OutputChannels {
    /// Open one sink per language from `template`.
    ///
    /// Fails if two languages would share a file.
    pub fn open(template: &str, languages: &[String], date: NaiveDate) -> io::Result<Self> {
        let mut channels: Vec<OutputChannel> = Vec::with_capacity(languages.len());
        for language in languages {
            let path = PathBuf::from(resolve_template(template, date, Some(language)));
            if let Some(other) = channels.iter().find(|c| c.sink.path() == path) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "languages {} and {language} both map to {}",
                        other.language,
                        path.display()
                    ),
                ));
            }
            let sink = JsonArraySink::create(&path)?;
            log::info!("Language {language} will be in file {}", path.display());
            channels.push(OutputChannel {
                language: language.clone(),
                sink,
                stats: LanguageStats::default(),
            });
        }
        Ok(Self { channels })
    }

    pub fn get(&self, language: &str) -> Option<&OutputChannel> {
        self.channels.iter().find(|c| c.language == language)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputChannel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Close every document. Each language is finished independently; a
    /// failure is recorded in its report and does not affect the others.
    pub fn finish(self) -> Vec<LanguageReport> {
        self.channels
            .into_iter()
            .map(|c| {
                let path = c.sink.path().to_path_buf();
                let counts = c.stats.snapshot();
                match c.sink.finish() {
                    Ok(written) => LanguageReport {
                        language: c.language,
                        path,
                        written,
                        counts,
                        error: None,
                    },
                    Err(e) => {
                        log::error!("{}: cannot finish {}: {e}", c.language, path.display());
                        LanguageReport {
                            language: c.language,
                            path,
                            written: 0,
                            counts,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    }
}

/// Save a raw response body as `{dir}/{identifier}-{language}.json`.
pub fn save_faulty(dir: &Path, identifier: &str, language: &str, body: &[u8]) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let name: String = format!("{identifier}-{language}.json")
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let path = dir.join(name);
    std::fs::write(&path, body)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 5, 3).unwrap()
    }

    #[test]
    fn one_document_per_language() {
        let dir = TempDir::new().unwrap();
        let template = format!("{}/{{TIMESTAMP}}-EFDump-{{LANG}}.json", dir.path().display());
        let langs = vec!["de-DE".to_string(), "en-US".to_string()];

        let channels = OutputChannels::open(&template, &langs, date()).unwrap();
        assert_eq!(channels.len(), 2);

        let de = channels.get("de-DE").unwrap();
        de.sink.append_raw(br#"{"id":"1"}"#).unwrap();
        de.stats.record_success();
        assert!(channels.get("fr-FR").is_none());

        let reports = channels.finish();
        assert_eq!(reports[0].written, 1);
        assert_eq!(reports[0].counts.succeeded, 1);
        assert_eq!(reports[1].written, 0);
        assert!(reports.iter().all(|r| r.error.is_none()));

        let de_text =
            std::fs::read_to_string(dir.path().join("20180503-EFDump-de-DE.json")).unwrap();
        assert_eq!(de_text, "[{\"id\":\"1\"}\n]");
        let en_text =
            std::fs::read_to_string(dir.path().join("20180503-EFDump-en-US.json")).unwrap();
        assert_eq!(en_text, "[]");
    }

    #[test]
    fn colliding_paths_rejected() {
        let dir = TempDir::new().unwrap();
        let template = format!("{}/dump.json", dir.path().display());
        let langs = vec!["de-DE".to_string(), "en-US".to_string()];
        let err = OutputChannels::open(&template, &langs, date()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn faulty_bodies_saved() {
        let dir = TempDir::new().unwrap();
        let faulty = dir.path().join("faulty");
        let path = save_faulty(&faulty, "118540238", "de-DE", b"{broken").unwrap();
        assert_eq!(path, faulty.join("118540238-de-DE.json"));
        assert_eq!(std::fs::read(&path).unwrap(), b"{broken");
    }
}
