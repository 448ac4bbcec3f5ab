use efdump_core::{Term, Triple};
use efdump_gnd::vocab::{DEPRECATED_URI, RDF_TYPE};
use efdump_gnd::{BeaconAggregator, EntityClassCounters, EntityFilter};

const PERSON: &str = "http://d-nb.info/standards/elementset/gnd#DifferentiatedPerson";
const WORK: &str = "http://d-nb.info/standards/elementset/gnd#Work";

/// Grouped stream: every subject has a type, a name, and every third one
/// two deprecated identifiers.
fn synthetic_triples(subjects: usize) -> Vec<Triple> {
    let mut out = Vec::with_capacity(subjects * 3);
    for i in 0..subjects {
        let subject = format!("http://d-nb.info/gnd/{i}");
        let class = if i % 5 == 0 { WORK } else { PERSON };
        out.push(Triple::new(&subject, RDF_TYPE, Term::Iri(class.into())));
        out.push(Triple::new(
            &subject,
            "http://d-nb.info/standards/elementset/gnd#preferredName",
            Term::Literal(format!("Name {i}")),
        ));
        if i % 3 == 0 {
            for v in 0..2 {
                out.push(Triple::new(
                    &subject,
                    DEPRECATED_URI,
                    Term::Literal(format!("http://d-nb.info/gnd/{i}-{v}")),
                ));
            }
        }
    }
    out
}

#[divan::bench(args = [10_000, 100_000])]
fn aggregate(bencher: divan::Bencher, subjects: usize) {
    let triples = synthetic_triples(subjects);
    bencher.bench(|| {
        let mut agg = BeaconAggregator::new(true);
        let mut lines = 0usize;
        for t in &triples {
            if let Some(group) = agg.push(t) {
                lines += group.lines.len();
            }
        }
        lines + agg.finish().map_or(0, |g| g.lines.len())
    });
}

#[divan::bench(args = [10_000, 100_000])]
fn entity_filter(bencher: divan::Bencher, subjects: usize) {
    let triples = synthetic_triples(subjects);
    bencher.bench(|| {
        let counters = EntityClassCounters::new();
        let mut filter = EntityFilter::new();
        triples
            .iter()
            .filter_map(|t| filter.accept(t, &counters))
            .count()
    });
}

fn main() {
    divan::main();
}
