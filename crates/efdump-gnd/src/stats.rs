//! Run statistics and summary tables.
//!
//! Statistics hierarchy:
//! - Input-level: `InputReport` (one per file, both modes)
//! - Run-level: `DumpSummary`, `BeaconSummary`

use std::path::PathBuf;
use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use efdump_core::{PoolStats, fmt_num};

use crate::output::LanguageReport;
use crate::vocab::class_label;

// =============================================================================
// Input-level
// =============================================================================

/// What one input file contributed.
#[derive(Debug, Clone, Default)]
pub struct InputReport {
    pub path: PathBuf,
    /// Triples decoded (0 for identifier lists)
    pub triples: u64,
    /// Entities seen: typed subjects (dump), subject groups (beacon) or list lines
    pub entities: u64,
    /// Entities accepted: submitted for fetch (dump) or of an allowed class (beacon)
    pub accepted: u64,
    /// Set when the file could not be read to the end
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl InputReport {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Log file completion (non-TTY mode).
    pub fn log(&self) {
        match &self.error {
            None => log::info!(
                "{}: {} entities, {} accepted [{:.1}s]",
                self.name(),
                fmt_num(self.entities),
                fmt_num(self.accepted),
                self.elapsed.as_secs_f64()
            ),
            Some(e) => log::error!(
                "{}: aborted after {} entities: {e}",
                self.name(),
                fmt_num(self.entities)
            ),
        }
    }
}

fn header(title: &str, columns: &[&str]) -> Vec<Cell> {
    let mut cells = vec![Cell::new(title)
        .fg(Color::Cyan)
        .add_attribute(comfy_table::Attribute::Bold)];
    cells.extend(columns.iter().map(|c| Cell::new(c).fg(Color::Cyan)));
    cells
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn inputs_table(inputs: &[InputReport]) -> Table {
    let mut table = new_table();
    table.set_header(header("Input", &["Triples", "Entities", "Accepted", "Status"]));
    for input in inputs {
        let status = match &input.error {
            None => Cell::new("ok").fg(Color::Green),
            Some(_) => Cell::new("failed").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(input.name()),
            Cell::new(fmt_num(input.triples)),
            Cell::new(fmt_num(input.entities)),
            Cell::new(fmt_num(input.accepted)),
            status,
        ]);
    }
    table
}

fn classes_table(classes: &[(&'static str, u64)]) -> Table {
    let mut table = new_table();
    table.set_header(header("Entity class", &["Accepted"]));
    for (class, n) in classes {
        table.add_row(vec![Cell::new(class_label(class)), Cell::new(fmt_num(*n))]);
    }
    table
}

fn count_failed(inputs: &[InputReport]) -> usize {
    inputs.iter().filter(|i| i.error.is_some()).count()
}

// =============================================================================
// Dump mode
// =============================================================================

/// Result of a dump run.
#[derive(Debug, Clone, Default)]
pub struct DumpSummary {
    pub inputs: Vec<InputReport>,
    pub languages: Vec<LanguageReport>,
    /// Accepted subjects per entity class (triple inputs only)
    pub classes: Vec<(&'static str, u64)>,
    pub pool: PoolStats,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl DumpSummary {
    pub fn failed_inputs(&self) -> usize {
        count_failed(&self.inputs)
    }

    /// Languages whose document could not be completed
    pub fn failed_outputs(&self) -> usize {
        self.languages.iter().filter(|l| l.error.is_some()).count()
    }

    pub fn entities(&self) -> u64 {
        self.inputs.iter().map(|i| i.entities).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed_inputs() == 0 && self.failed_outputs() == 0
    }

    /// Format summary tables as a string.
    pub fn format_table(&self) -> String {
        let mut langs = new_table();
        langs.set_header(header(
            "Language",
            &["Written", "Rejected", "Failed", "Retries", "File"],
        ));
        for l in &self.languages {
            let file = match &l.error {
                None => Cell::new(l.path.display()),
                Some(e) => Cell::new(format!("{} ({e})", l.path.display())).fg(Color::Red),
            };
            langs.add_row(vec![
                Cell::new(&l.language).fg(Color::Green),
                Cell::new(fmt_num(l.written)).fg(Color::Green),
                Cell::new(fmt_num(l.counts.rejected)),
                Cell::new(fmt_num(l.counts.failed)),
                Cell::new(fmt_num(l.counts.retried)),
                file,
            ]);
        }

        let mut out = format!("\n{}\n{langs}", inputs_table(&self.inputs));
        if !self.classes.is_empty() {
            out.push_str(&format!("\n{}", classes_table(&self.classes)));
        }
        out.push_str(&format!(
            "\n  Entities: {}  |  Tasks: {}  |  Retries: {}  |  Elapsed: {:.1}s",
            fmt_num(self.entities()),
            fmt_num(self.pool.completed),
            fmt_num(self.pool.retries),
            self.elapsed.as_secs_f64()
        ));
        if self.pool.panicked > 0 {
            out.push_str(&format!("  |  Panicked: {}", self.pool.panicked));
        }
        if self.interrupted {
            out.push_str("\n  Interrupted: outputs contain only completed lookups");
        }
        out
    }

    /// Print summary tables to stderr (TTY mode).
    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        for l in &self.languages {
            log::info!(
                "{}: {} written, {} rejected, {} failed, {} retries -> {}",
                l.language,
                fmt_num(l.written),
                fmt_num(l.counts.rejected),
                fmt_num(l.counts.failed),
                fmt_num(l.counts.retried),
                l.path.display()
            );
        }
        for (class, n) in &self.classes {
            log::info!("  {}: {}", class_label(class), fmt_num(*n));
        }
        log::info!(
            "Dump complete: {} entities from {} inputs ({} failed) in {:.1}s",
            fmt_num(self.entities()),
            self.inputs.len(),
            self.failed_inputs(),
            self.elapsed.as_secs_f64()
        );
    }
}

// =============================================================================
// Beacon mode
// =============================================================================

/// Result of a beacon run.
#[derive(Debug, Clone, Default)]
pub struct BeaconSummary {
    pub inputs: Vec<InputReport>,
    pub output: PathBuf,
    /// `variant||primary` lines written
    pub lines: u64,
    /// Subjects with redirects per entity class
    pub classes: Vec<(&'static str, u64)>,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl BeaconSummary {
    pub fn failed_inputs(&self) -> usize {
        count_failed(&self.inputs)
    }

    pub fn entities(&self) -> u64 {
        self.inputs.iter().map(|i| i.entities).sum()
    }

    pub fn accepted(&self) -> u64 {
        self.inputs.iter().map(|i| i.accepted).sum()
    }

    pub fn format_table(&self) -> String {
        let mut out = format!("\n{}", inputs_table(&self.inputs));
        if !self.classes.is_empty() {
            out.push_str(&format!("\n{}", classes_table(&self.classes)));
        }
        out.push_str(&format!(
            "\n  Redirects: {}  |  Entities: {}  |  Output: {}  |  Elapsed: {:.1}s",
            fmt_num(self.lines),
            fmt_num(self.entities()),
            self.output.display(),
            self.elapsed.as_secs_f64()
        ));
        if self.interrupted {
            out.push_str("\n  Interrupted: output is incomplete");
        }
        out
    }

    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    pub fn log(&self) {
        for (class, n) in &self.classes {
            log::info!("  {}: {}", class_label(class), fmt_num(*n));
        }
        log::info!(
            "Beacon complete: {} redirects for {} of {} entities -> {} [{:.1}s]",
            fmt_num(self.lines),
            fmt_num(self.accepted()),
            fmt_num(self.entities()),
            self.output.display(),
            self.elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::LanguageCounts;

    fn input(name: &str, entities: u64, error: Option<&str>) -> InputReport {
        InputReport {
            path: PathBuf::from("/data").join(name),
            entities,
            accepted: entities / 2,
            error: error.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn input_name_is_file_name() {
        assert_eq!(input("ids.csv", 0, None).name(), "ids.csv");
    }

    #[test]
    fn dump_summary_counts_failures() {
        let summary = DumpSummary {
            inputs: vec![
                input("a.ttl.gz", 10, None),
                input("b.ttl.gz", 4, Some("truncated")),
            ],
            languages: vec![LanguageReport {
                language: "de-DE".into(),
                path: PathBuf::from("out.json"),
                written: 3,
                counts: LanguageCounts {
                    succeeded: 3,
                    ..Default::default()
                },
                error: None,
            }],
            ..Default::default()
        };
        assert_eq!(summary.entities(), 14);
        assert_eq!(summary.failed_inputs(), 1);
        assert_eq!(summary.failed_outputs(), 0);
        assert!(!summary.is_success());

        let table = summary.format_table();
        assert!(table.contains("de-DE"));
        assert!(table.contains("b.ttl.gz"));
    }

    #[test]
    fn beacon_summary_table() {
        let summary = BeaconSummary {
            inputs: vec![input("gnd.ttl.gz", 1_000, None)],
            output: PathBuf::from("beacon.txt"),
            lines: 1_234,
            classes: vec![(
                "http://d-nb.info/standards/elementset/gnd#Family",
                7,
            )],
            ..Default::default()
        };
        assert_eq!(summary.accepted(), 500);
        let table = summary.format_table();
        assert!(table.contains("1,234"));
        assert!(table.contains("Family"));
    }
}
