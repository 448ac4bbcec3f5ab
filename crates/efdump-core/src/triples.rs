//! Streaming decode of compressed triple dumps.
//!
//! Each input file gets its own decoder thread. The thread parses with
//! `rio_turtle` and hands triples to the consumer in batches over a bounded
//! channel, so decompression overlaps with downstream work and a slow
//! consumer stalls the parser instead of growing memory.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rio_api::model::{Literal, Subject, Term as RioTerm, Triple as RioTriple};
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesParser, TurtleError, TurtleParser};

use crate::error::DecodeError;
use crate::stream::{self, ByteCounter};

/// Triples per channel message
const BATCH_SIZE: usize = 1024;

/// Default channel capacity (in batches)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Object position of a triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    Blank(String),
    /// Lexical form only; language tag and datatype are dropped
    Literal(String),
}

impl Term {
    /// IRI, blank node label or literal value
    pub fn as_str(&self) -> &str {
        match self {
            Self::Iri(s) | Self::Blank(s) | Self::Literal(s) => s,
        }
    }
}

/// Owned (subject, predicate, object) statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: &str, predicate: &str, object: Term) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object,
        }
    }

    fn from_rio(t: &RioTriple<'_>) -> Self {
        let subject = match t.subject {
            Subject::NamedNode(n) => n.iri.to_string(),
            Subject::BlankNode(b) => format!("_:{}", b.id),
            #[allow(unreachable_patterns)]
            ref other => other.to_string(),
        };
        let object = match t.object {
            RioTerm::NamedNode(n) => Term::Iri(n.iri.to_string()),
            RioTerm::BlankNode(b) => Term::Blank(format!("_:{}", b.id)),
            RioTerm::Literal(Literal::Simple { value })
            | RioTerm::Literal(Literal::LanguageTaggedString { value, .. })
            | RioTerm::Literal(Literal::Typed { value, .. }) => Term::Literal(value.to_string()),
            #[allow(unreachable_patterns)]
            ref other => Term::Literal(other.to_string()),
        };
        Self {
            subject,
            predicate: t.predicate.iri.to_string(),
            object,
        }
    }
}

/// Serialization of a dump file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripleFormat {
    Turtle,
    NTriples,
}

impl TripleFormat {
    /// Detect from file name, ignoring a trailing `.gz`.
    ///
    /// `dump.ttl.gz` → Turtle, `dump.nt` → N-Triples, `ids.csv` → None.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".ttl") || name.ends_with(".turtle") {
            Some(Self::Turtle)
        } else if name.ends_with(".nt") || name.ends_with(".ntriples") {
            Some(Self::NTriples)
        } else {
            None
        }
    }
}

impl std::fmt::Display for TripleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Turtle => f.write_str("turtle"),
            Self::NTriples => f.write_str("n-triples"),
        }
    }
}

/// Totals reported by a finished decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeStats {
    pub triples: u64,
    pub bytes_read: u64,
    pub elapsed: Duration,
}

enum Chunk {
    Triples(Vec<Triple>),
    Failed(DecodeError),
}

/// Why the parse callback stopped early
enum ParseStop {
    Syntax(TurtleError),
    Disconnected,
}

impl From<TurtleError> for ParseStop {
    fn from(e: TurtleError) -> Self {
        Self::Syntax(e)
    }
}

/// Single-pass, forward-only sequence of triples from one file.
///
/// Yields `Err` at most once, as its last item.
pub struct TripleStream {
    rx: Receiver<Chunk>,
    current: std::vec::IntoIter<Triple>,
    handle: Option<JoinHandle<DecodeStats>>,
    counter: ByteCounter,
    total_bytes: u64,
    finished: bool,
}

impl std::fmt::Debug for TripleStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleStream")
            .field("bytes_read", &self.bytes_read())
            .field("total_bytes", &self.total_bytes)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl TripleStream {
    /// Compressed bytes consumed so far
    pub fn bytes_read(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Size of the input file
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Stop consuming and wait for the decoder thread.
    ///
    /// Safe to call before the stream is exhausted: the decoder notices the
    /// closed channel on its next send and stops.
    pub fn finish(self) -> DecodeStats {
        let Self { rx, handle, .. } = self;
        drop(rx);
        match handle.map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                log::error!("triple decoder thread panicked");
                DecodeStats::default()
            }
            None => DecodeStats::default(),
        }
    }
}

impl Iterator for TripleStream {
    type Item = Result<Triple, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(t) = self.current.next() {
                return Some(Ok(t));
            }
            if self.finished {
                return None;
            }
            match self.rx.recv() {
                Ok(Chunk::Triples(batch)) => self.current = batch.into_iter(),
                Ok(Chunk::Failed(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Err(_) => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

/// Open `path` and start decoding it on a dedicated thread.
///
/// Opening errors are returned directly; errors while decoding arrive as
/// the stream's last item. `capacity` bounds the hand-off buffer in batches.
pub fn spawn_decoder(
    path: &Path,
    format: TripleFormat,
    capacity: usize,
) -> std::io::Result<TripleStream> {
    let (reader, counter, total_bytes) = stream::open_input(path, stream::is_gzip(path))?;
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    let thread_counter = counter.clone();
    let label = path.display().to_string();

    let handle = std::thread::Builder::new()
        .name("triple-decoder".into())
        .spawn(move || {
            let start = Instant::now();
            let triples = match format {
                TripleFormat::Turtle => pump(TurtleParser::new(reader, None), &tx, &label),
                TripleFormat::NTriples => pump(NTriplesParser::new(reader), &tx, &label),
            };
            DecodeStats {
                triples,
                bytes_read: thread_counter.load(Ordering::Relaxed),
                elapsed: start.elapsed(),
            }
        })?;

    Ok(TripleStream {
        rx,
        current: Vec::new().into_iter(),
        handle: Some(handle),
        counter,
        total_bytes,
        finished: false,
    })
}

/// Drive a parser to completion, sending batches; returns triples decoded.
fn pump<P>(mut parser: P, tx: &SyncSender<Chunk>, label: &str) -> u64
where
    P: TriplesParser<Error = TurtleError>,
{
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    let mut count = 0u64;

    let result = parser.parse_all(&mut |t: RioTriple<'_>| -> Result<(), ParseStop> {
        batch.push(Triple::from_rio(&t));
        count += 1;
        if batch.len() >= BATCH_SIZE {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
            tx.send(Chunk::Triples(full))
                .map_err(|_| ParseStop::Disconnected)?;
        }
        Ok(())
    });

    // Triples parsed before a failure are still valid; deliver them first
    let flushed = batch.is_empty() || tx.send(Chunk::Triples(batch)).is_ok();

    match result {
        Ok(()) => {}
        Err(ParseStop::Disconnected) => {
            log::debug!("{label}: consumer stopped after {count} triples");
        }
        Err(ParseStop::Syntax(e)) => {
            if flushed {
                let _ = tx.send(Chunk::Failed(DecodeError::from(e)));
            }
        }
    }
    count
}
