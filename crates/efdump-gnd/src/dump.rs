//! Dump mode: inputs → entity filter → fetch pool → per-language documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use efdump_core::triples::DEFAULT_CHANNEL_CAPACITY;
use efdump_core::{
    SharedProgress, TripleFormat, WorkerPool, fmt_num, is_shutdown_requested, spawn_decoder,
    spawn_monitor,
};
use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::client::Fetch;
use crate::config::{DumpConfig, normalize_dump_template};
use crate::fetch::{FetchHandler, FetchTask};
use crate::filter::{EntityClassCounters, EntityFilter};
use crate::ids::read_identifiers;
use crate::stats::{DumpSummary, InputReport};

pub use crate::output::{OutputChannel, OutputChannels};

/// Log a progress line every this many entities (non-TTY)
pub(crate) const LOG_EVERY: u64 = 100_000;

/// Refresh file bars every this many items
const BAR_EVERY: u64 = 4096;

/// How an input file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Triples(TripleFormat),
    /// One identifier per line
    IdentifierList,
}

impl InputKind {
    /// Triple dumps by extension; anything else is an identifier list.
    pub fn from_path(path: &Path) -> Self {
        TripleFormat::from_path(path).map_or(Self::IdentifierList, Self::Triples)
    }
}

/// Everything a feeder needs, shared across input files
struct Feeder<'a> {
    pool: &'a WorkerPool<FetchTask>,
    languages: &'a [Arc<str>],
    counters: &'a EntityClassCounters,
    progress: &'a SharedProgress,
}

impl Feeder<'_> {
    /// Submit one task per language, blocking on backpressure.
    fn submit(&self, identifier: &str) {
        let identifier: Arc<str> = Arc::from(identifier);
        for language in self.languages {
            self.pool
                .submit(FetchTask::new(identifier.clone(), language.clone()));
        }
    }

    fn feed(&self, path: &Path) -> InputReport {
        let start = Instant::now();
        let mut report = InputReport::new(path.to_path_buf());
        let result = match InputKind::from_path(path) {
            InputKind::Triples(format) => self.feed_triples(path, format, &mut report),
            InputKind::IdentifierList => self.feed_list(path, &mut report),
        };
        if let Err(e) = result {
            report.error = Some(format!("{e:#}"));
        }
        report.elapsed = start.elapsed();
        if !self.progress.is_tty() {
            report.log();
        } else if let Some(e) = &report.error {
            log::error!("{}: {e}", report.name());
        }
        report
    }

    fn bar(&self, report: &InputReport, total: u64) -> ProgressBar {
        self.progress.file_bar(&report.name(), total)
    }

    fn tick(&self, report: &InputReport, bar: &ProgressBar, bytes: u64) {
        if report.entities % BAR_EVERY == 0 {
            bar.set_position(bytes);
            bar.set_message(format!("{} accepted", fmt_num(report.accepted)));
        }
        if report.entities % LOG_EVERY == 0 && !self.progress.is_tty() {
            log::info!(
                "{}: {} entities processed, {} are accepted entity types",
                report.name(),
                fmt_num(report.entities),
                fmt_num(report.accepted)
            );
        }
    }

    fn feed_triples(
        &self,
        path: &Path,
        format: TripleFormat,
        report: &mut InputReport,
    ) -> anyhow::Result<()> {
        let mut stream = spawn_decoder(path, format, DEFAULT_CHANNEL_CAPACITY)
            .with_context(|| format!("Cannot open {}", path.display()))?;
        let bar = self.bar(report, stream.total_bytes());
        let mut filter = EntityFilter::new();
        let mut failure = None;

        while let Some(item) = stream.next() {
            if is_shutdown_requested() {
                log::warn!("{}: shutdown requested, stopping", report.name());
                break;
            }
            let triple = match item {
                Ok(t) => t,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            let before = filter.typed;
            if let Some(id) = filter.accept(&triple, self.counters) {
                self.submit(&id);
            }
            if filter.typed != before {
                report.entities = filter.typed;
                report.accepted = filter.accepted;
                self.tick(report, &bar, stream.bytes_read());
            }
        }

        report.entities = filter.typed;
        report.accepted = filter.accepted;
        let stats = stream.finish();
        report.triples = stats.triples;
        bar.finish_and_clear();
        match failure {
            Some(e) => Err(anyhow::Error::new(e).context("Decoding failed")),
            None => Ok(()),
        }
    }

    fn feed_list(&self, path: &Path, report: &mut InputReport) -> anyhow::Result<()> {
        let mut ids = read_identifiers(path)
            .with_context(|| format!("Cannot open {}", path.display()))?;
        let bar = self.bar(report, ids.total_bytes());

        while let Some(id) = ids.next() {
            if is_shutdown_requested() {
                log::warn!("{}: shutdown requested, stopping", report.name());
                break;
            }
            let id = id.context("Reading identifiers failed")?;
            self.submit(&id);
            report.entities += 1;
            report.accepted += 1;
            self.tick(report, &bar, ids.bytes_read());
        }
        bar.finish_and_clear();
        Ok(())
    }
}

/// Run dump mode to completion.
///
/// Output documents are opened before any work is submitted and closed
/// after the pool has drained, so each is a complete JSON array even when
/// inputs fail or a shutdown is requested.
pub fn run_dump<F>(
    config: &DumpConfig,
    fetcher: Arc<F>,
    progress: &SharedProgress,
) -> anyhow::Result<DumpSummary>
where
    F: Fetch + 'static,
{
    config.validate()?;
    let start = Instant::now();
    let template = normalize_dump_template(&config.output_template, config.languages.len());
    let date = chrono::Local::now().date_naive();

    log::info!(
        "efdump starting: {} inputs, languages={:?}, workers={}, max_submitted={}",
        config.inputs.len(),
        config.languages,
        config.pool.workers,
        config.pool.max_submitted
    );

    let channels = Arc::new(
        OutputChannels::open(&template, &config.languages, date)
            .context("Cannot open output files")?,
    );
    let languages: Vec<Arc<str>> = config
        .languages
        .iter()
        .map(|l| Arc::from(l.as_str()))
        .collect();
    let counters = EntityClassCounters::new();

    let handler = FetchHandler::new(
        fetcher,
        channels.clone(),
        config.retry,
        config.faulty_dir.clone(),
    );
    let pool = WorkerPool::new(&config.pool, move |task: FetchTask| handler.handle(task))
        .context("Failed to start worker pool")?;
    let probe = pool.probe();
    let monitor = spawn_monitor(
        move || probe.snapshot(),
        config.monitor_interval,
        progress.stage_line("fetch"),
    )
    .context("Failed to start status monitor")?;

    let feeders = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallel_files.max(1))
        .thread_name(|i| format!("feeder-{i}"))
        .build()
        .context("Failed to create feeder pool")?;

    let feeder = Feeder {
        pool: &pool,
        languages: &languages,
        counters: &counters,
        progress,
    };
    let inputs: Vec<InputReport> =
        feeders.install(|| config.inputs.par_iter().map(|p| feeder.feed(p)).collect());

    log::info!("All inputs submitted, waiting for outstanding lookups");
    let pool_stats = pool.shutdown();
    monitor.stop();

    let channels = Arc::into_inner(channels)
        .context("Output channels still in use after pool shutdown")?;
    let languages = channels.finish();

    Ok(DumpSummary {
        inputs,
        languages,
        classes: counters.snapshot(),
        pool: pool_stats,
        interrupted: is_shutdown_requested(),
        elapsed: start.elapsed(),
    })
}

/// Input paths in the order given, without duplicates
pub fn dedup_inputs(inputs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    inputs
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_kind_by_extension() {
        assert_eq!(
            InputKind::from_path(Path::new("Tpgesamt.ttl.gz")),
            InputKind::Triples(TripleFormat::Turtle)
        );
        assert_eq!(
            InputKind::from_path(Path::new("gnd.nt.gz")),
            InputKind::Triples(TripleFormat::NTriples)
        );
        assert_eq!(
            InputKind::from_path(Path::new("ids.csv")),
            InputKind::IdentifierList
        );
        assert_eq!(
            InputKind::from_path(Path::new("ids.txt.gz")),
            InputKind::IdentifierList
        );
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let inputs = vec![
            PathBuf::from("b.csv"),
            PathBuf::from("a.csv"),
            PathBuf::from("b.csv"),
        ];
        assert_eq!(
            dedup_inputs(inputs),
            vec![PathBuf::from("b.csv"), PathBuf::from("a.csv")]
        );
    }
}
