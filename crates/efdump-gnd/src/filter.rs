//! Entity filter: picks subjects whose type is an allowed GND class.

use std::sync::atomic::{AtomicU64, Ordering};

use efdump_core::Triple;
use rustc_hash::FxHashMap;

use crate::vocab::{self, ALLOWED_ENTITY_TYPES};

/// Accepted-subject count per entity class.
///
/// All classes are registered up front, so increments from many threads
/// only touch atomics.
#[derive(Debug)]
pub struct EntityClassCounters {
    counts: FxHashMap<&'static str, AtomicU64>,
}

impl Default for EntityClassCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityClassCounters {
    pub fn new() -> Self {
        Self {
            counts: ALLOWED_ENTITY_TYPES
                .iter()
                .map(|c| (*c, AtomicU64::new(0)))
                .collect(),
        }
    }

    /// Count one accepted subject. Returns false for unknown classes.
    pub fn increment(&self, class: &str) -> bool {
        match self.counts.get(class) {
            Some(c) => {
                c.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, class: &str) -> u64 {
        self.counts
            .get(class)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Non-zero counts, largest first (ties by class IRI)
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        let mut out: Vec<_> = self
            .counts
            .iter()
            .map(|(k, v)| (*k, v.load(Ordering::Relaxed)))
            .filter(|(_, n)| *n > 0)
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        out
    }
}

/// Streaming filter over one file's triples.
///
/// A subject is accepted on its first `rdf:type` triple naming an allowed
/// class; further type triples for the same (adjacent) subject are ignored
/// so a multi-typed entity is fetched once.
#[derive(Debug, Default)]
pub struct EntityFilter {
    last_accepted: Option<String>,
    /// Type triples inspected
    pub typed: u64,
    /// Subjects accepted
    pub accepted: u64,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of a newly accepted subject, counted in `counters`.
    pub fn accept(&mut self, triple: &Triple, counters: &EntityClassCounters) -> Option<String> {
        if !vocab::is_type_predicate(&triple.predicate) {
            return None;
        }
        self.typed += 1;
        let class = vocab::allowed_class(triple.object.as_str())?;
        if self.last_accepted.as_deref() == Some(triple.subject.as_str()) {
            return None;
        }
        self.last_accepted = Some(triple.subject.clone());
        counters.increment(class);
        self.accepted += 1;
        Some(vocab::strip_identifier(&triple.subject))
    }
}
