//! BEACON mode: deprecated identifier → primary identifier redirects.
//!
//! Input must be grouped by subject, with each subject's type triple
//! first. Ungrouped input is not detected and yields wrong groupings.

use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDate;
use efdump_core::triples::DEFAULT_CHANNEL_CAPACITY;
use efdump_core::{
    LineSink, SharedProgress, Triple, TripleFormat, fmt_num, is_shutdown_requested,
    spawn_decoder,
};
use rayon::prelude::*;

use crate::config::{BeaconConfig, resolve_template};
use crate::dump::LOG_EVERY;
use crate::filter::EntityClassCounters;
use crate::stats::{BeaconSummary, InputReport};
use crate::vocab::{self, GND_PREFIX};

/// One allowed-class subject and its redirect lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectGroup {
    /// Canonical IRI of the entity class
    pub class: &'static str,
    pub primary: String,
    /// `variant||primary`, in first-seen order; empty without variants
    pub lines: Vec<String>,
}

/// Subject-adjacency grouping state for one triple stream
#[derive(Debug, Default)]
pub struct BeaconAggregator {
    current_subject: Option<String>,
    current_type: String,
    variants: Vec<String>,
    flush_trailing: bool,
    /// Subject transitions seen
    pub entities: u64,
    /// Allowed-class subjects flushed, with or without variants
    pub accepted: u64,
}

impl BeaconAggregator {
    pub fn new(flush_trailing: bool) -> Self {
        Self {
            flush_trailing,
            ..Default::default()
        }
    }

    /// Feed one triple; returns the previous subject's group when the
    /// subject changes and its class is allowed.
    pub fn push(&mut self, triple: &Triple) -> Option<RedirectGroup> {
        let mut flushed = None;
        if self.current_subject.as_deref() != Some(triple.subject.as_str()) {
            flushed = self.flush();
            self.current_subject = Some(triple.subject.clone());
            self.current_type.clear();
            self.current_type.push_str(triple.object.as_str());
            self.variants.clear();
            self.entities += 1;
        }
        if vocab::is_deprecated_predicate(&triple.predicate) {
            let variant = triple.object.as_str();
            if !self.variants.iter().any(|v| v == variant) {
                self.variants.push(variant.to_string());
            }
        }
        flushed
    }

    /// End of stream: the last subject's group, unless trailing flush is off.
    pub fn finish(mut self) -> Option<RedirectGroup> {
        if self.flush_trailing {
            self.flush()
        } else {
            None
        }
    }

    fn flush(&mut self) -> Option<RedirectGroup> {
        let class = vocab::allowed_class(&self.current_type)?;
        let subject = self.current_subject.as_deref()?;
        let primary = vocab::strip_identifier(subject);
        let lines = self
            .variants
            .drain(..)
            .map(|v| format!("{}||{primary}", vocab::strip_identifier(&v)))
            .collect();
        self.accepted += 1;
        Some(RedirectGroup {
            class,
            primary,
            lines,
        })
    }
}

/// Fixed BEACON header block, dated `date`
pub fn beacon_header(date: NaiveDate) -> String {
    format!(
        "#FORMAT: BEACON\n\
         #PREFIX: {GND_PREFIX}\n\
         #TARGET: {GND_PREFIX}\n\
         #CONTACT: Gemeinsame Normdatei (GND) <gnd-info@dnb.de>\n\
         #INSTITUTION: Deutsche Nationalbibliothek\n\
         #DESCRIPTION: List of deprecated GND URIs to their valid primary GND URI\n\
         #TIMESTAMP: {}\n\
         #UPDATE: monthly\n",
        date.format("%Y-%m-%d")
    )
}

/// Write the header block to `w`.
pub fn write_header<W: Write>(w: &mut W, date: NaiveDate) -> io::Result<()> {
    w.write_all(beacon_header(date).as_bytes())
}

fn aggregate_file(
    path: &Path,
    sink: &LineSink,
    counters: &EntityClassCounters,
    flush_trailing: bool,
    progress: &SharedProgress,
) -> InputReport {
    let start = Instant::now();
    let mut report = InputReport::new(path.to_path_buf());
    let result = aggregate_into(path, sink, counters, flush_trailing, progress, &mut report);
    if let Err(e) = result {
        report.error = Some(format!("{e:#}"));
    }
    report.elapsed = start.elapsed();
    if !progress.is_tty() {
        report.log();
    } else if let Some(e) = &report.error {
        log::error!("{}: {e}", report.name());
    }
    report
}

fn aggregate_into(
    path: &Path,
    sink: &LineSink,
    counters: &EntityClassCounters,
    flush_trailing: bool,
    progress: &SharedProgress,
    report: &mut InputReport,
) -> anyhow::Result<()> {
    let format = TripleFormat::from_path(path)
        .with_context(|| format!("Not a triple dump: {}", path.display()))?;
    let mut stream = spawn_decoder(path, format, DEFAULT_CHANNEL_CAPACITY)
        .with_context(|| format!("Cannot open {}", path.display()))?;
    let bar = progress.file_bar(&report.name(), stream.total_bytes());
    let mut agg = BeaconAggregator::new(flush_trailing);

    let emit = |group: RedirectGroup| -> io::Result<()> {
        counters.increment(group.class);
        if group.lines.is_empty() {
            return Ok(());
        }
        sink.write_group(&group.lines)
    };

    let mut failure = None;
    while let Some(item) = stream.next() {
        let triple = match item {
            Ok(t) => t,
            Err(e) => {
                failure = Some(anyhow::Error::new(e).context("Decoding failed"));
                break;
            }
        };
        let before = agg.entities;
        if let Some(group) = agg.push(&triple) {
            emit(group).context("Writing redirects failed")?;
        }
        if agg.entities != before && agg.entities % LOG_EVERY == 0 {
            if is_shutdown_requested() {
                log::warn!("{}: shutdown requested, stopping", report.name());
                break;
            }
            bar.set_position(stream.bytes_read());
            if !progress.is_tty() {
                log::info!(
                    "{}: {} entities processed, {} are accepted entity types",
                    report.name(),
                    fmt_num(agg.entities),
                    fmt_num(agg.accepted)
                );
            }
        }
    }

    report.entities = agg.entities;
    report.accepted = agg.accepted;
    // A decode failure leaves the last group possibly incomplete
    if failure.is_none() && !is_shutdown_requested() {
        if let Some(group) = agg.finish() {
            emit(group).context("Writing redirects failed")?;
            report.accepted += 1;
        }
    }

    report.triples = stream.finish().triples;
    bar.finish_and_clear();
    failure.map_or(Ok(()), Err)
}

/// Run beacon mode over every input into one BEACON file.
///
/// Files are aggregated independently (possibly in parallel); each group
/// is written contiguously.
pub fn run_beacon(config: &BeaconConfig, progress: &SharedProgress) -> anyhow::Result<BeaconSummary> {
    anyhow::ensure!(!config.inputs.is_empty(), "No input files");
    let start = Instant::now();
    let date = chrono::Local::now().date_naive();
    let output = std::path::PathBuf::from(resolve_template(&config.output_template, date, None));
    log::info!("Output file will be {}", output.display());

    let sink = LineSink::create(&output, &beacon_header(date))
        .with_context(|| format!("Cannot create {}", output.display()))?;
    let counters = EntityClassCounters::new();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallel_files.max(1))
        .thread_name(|i| format!("beacon-{i}"))
        .build()
        .context("Failed to create thread pool")?;

    let inputs: Vec<InputReport> = pool.install(|| {
        config
            .inputs
            .par_iter()
            .map(|p| aggregate_file(p, &sink, &counters, config.flush_trailing, progress))
            .collect()
    });

    let interrupted = is_shutdown_requested();
    let lines = if interrupted {
        log::warn!(
            "Interrupted: leaving incomplete output as {}.tmp",
            output.display()
        );
        sink.lines()
    } else {
        sink.finish()
            .with_context(|| format!("Cannot finish {}", output.display()))?
    };

    Ok(BeaconSummary {
        inputs,
        output,
        lines,
        classes: counters.snapshot(),
        interrupted,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use efdump_core::Term;

    const PERSON: &str = "http://d-nb.info/standards/elementset/gnd#DifferentiatedPerson";
    const WORK: &str = "http://d-nb.info/standards/elementset/gnd#Work";

    fn typed(subject: &str, class: &str) -> Triple {
        Triple::new(subject, vocab::RDF_TYPE, Term::Iri(class.into()))
    }

    fn deprecated(subject: &str, variant: &str) -> Triple {
        Triple::new(subject, vocab::DEPRECATED_URI, Term::Literal(variant.into()))
    }

    fn run(triples: &[Triple], flush_trailing: bool) -> Vec<RedirectGroup> {
        let mut agg = BeaconAggregator::new(flush_trailing);
        let mut out: Vec<_> = triples.iter().filter_map(|t| agg.push(t)).collect();
        out.extend(agg.finish());
        out.retain(|g| !g.lines.is_empty());
        out
    }

    #[test]
    fn emits_variants_of_allowed_subject_only() {
        let triples = vec![
            typed("http://d-nb.info/gnd/A", PERSON),
            deprecated("http://d-nb.info/gnd/A", "http://d-nb.info/gnd/v1"),
            deprecated("http://d-nb.info/gnd/A", "http://d-nb.info/gnd/v2"),
            typed("http://d-nb.info/gnd/B", WORK),
            deprecated("http://d-nb.info/gnd/B", "http://d-nb.info/gnd/v3"),
        ];
        let groups = run(&triples, true);

        assert_eq!(groups.len(), 1);
        let mut lines = groups[0].lines.clone();
        lines.sort();
        assert_eq!(lines, vec!["v1||A", "v2||A"]);
        assert_eq!(groups[0].class, PERSON);
    }

    #[test]
    fn trailing_group_flush_is_configurable() {
        let triples = vec![
            typed("http://d-nb.info/gnd/118540238", PERSON),
            deprecated("http://d-nb.info/gnd/118540238", "\"http://d-nb.info/gnd/1012345678\""),
        ];
        let flushed = run(&triples, true);
        assert_eq!(flushed[0].lines, vec!["1012345678||118540238"]);

        assert!(run(&triples, false).is_empty());
    }

    #[test]
    fn subject_without_variants_counts_but_writes_nothing() {
        const PLACE: &str = "http://d-nb.info/standards/elementset/gnd#PlaceOrGeographicName";
        let triples = vec![
            typed("http://d-nb.info/gnd/P", PLACE),
            typed("http://d-nb.info/gnd/Q", PLACE),
        ];
        let mut agg = BeaconAggregator::new(false);
        let out: Vec<_> = triples.iter().filter_map(|t| agg.push(t)).collect();
        assert_eq!(agg.entities, 2);
        assert_eq!(agg.accepted, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class, PLACE);
        assert_eq!(out[0].primary, "P");
        assert!(out[0].lines.is_empty());
        assert!(agg.finish().is_none());
    }

    #[test]
    fn disallowed_subject_is_not_counted() {
        let triples = vec![
            typed("http://d-nb.info/gnd/A", WORK),
            typed("http://d-nb.info/gnd/B", WORK),
        ];
        let mut agg = BeaconAggregator::new(true);
        let out: Vec<_> = triples.iter().filter_map(|t| agg.push(t)).collect();
        assert!(out.is_empty());
        assert_eq!(agg.accepted, 0);
        assert!(agg.finish().is_none());
    }

    #[test]
    fn duplicate_variants_collapse() {
        let triples = vec![
            typed("http://d-nb.info/gnd/A", PERSON),
            deprecated("http://d-nb.info/gnd/A", "http://d-nb.info/gnd/v1"),
            deprecated("http://d-nb.info/gnd/A", "http://d-nb.info/gnd/v1"),
        ];
        assert_eq!(run(&triples, true)[0].lines, vec!["v1||A"]);
    }

    #[test]
    fn type_must_be_first_triple() {
        // Documented precondition: a non-type first triple hides the class
        let triples = vec![
            deprecated("http://d-nb.info/gnd/A", "http://d-nb.info/gnd/v1"),
            typed("http://d-nb.info/gnd/A", PERSON),
        ];
        assert!(run(&triples, true).is_empty());
    }

    #[test]
    fn header_block() {
        let date = NaiveDate::from_ymd_opt(2018, 5, 3).unwrap();
        let header = beacon_header(date);
        let lines: Vec<&str> = header.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "#FORMAT: BEACON");
        assert_eq!(lines[1], "#PREFIX: http://d-nb.info/gnd/");
        assert_eq!(lines[6], "#TIMESTAMP: 2018-05-03");
        assert_eq!(lines[7], "#UPDATE: monthly");

        let mut buf = Vec::new();
        write_header(&mut buf, date).unwrap();
        assert_eq!(buf, header.as_bytes());
    }
}
