//! efdump GND - Entity Facts enrichment for the GND authority file
//!
//! Streams GND dumps or identifier lists, fetches each accepted entity
//! from Entity Facts in every requested language, and derives BEACON
//! redirect tables from deprecated identifiers.

pub mod beacon;
pub mod client;
pub mod config;
pub mod dump;
pub mod fetch;
pub mod filter;
pub mod ids;
pub mod output;
pub mod stats;
pub mod vocab;

// Re-exports
pub use beacon::{BeaconAggregator, RedirectGroup, run_beacon};
pub use client::{Document, EntityFactsClient, Fetch, FetchError};
pub use config::{BeaconConfig, DumpConfig};
pub use dump::{InputKind, run_dump};
pub use fetch::{FetchHandler, FetchTask};
pub use filter::{EntityClassCounters, EntityFilter};
pub use output::{OutputChannels, save_faulty};
pub use stats::{BeaconSummary, DumpSummary, InputReport};
