//! efdump core - shared infrastructure for the entity facts pipeline
//!
//! Bounded worker pool with delayed retries, streaming triple decoding,
//! concurrent-safe output sinks, progress/monitoring and logging.

pub mod error;
pub mod logging;
pub mod monitor;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod semaphore;
pub mod shutdown;
pub mod sink;
pub mod stream;
pub mod triples;

// Re-exports for convenience
pub use error::DecodeError;
pub use logging::{IndicatifLogger, init_logging};
pub use monitor::{MonitorHandle, format_status, spawn_monitor};
pub use pool::{PoolConfig, PoolProbe, PoolStats, TaskOutcome, WorkerPool};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{RetryDecision, RetryPolicy};
pub use semaphore::Semaphore;
pub use shutdown::{
    install_signal_handlers, is_shutdown_requested, request_shutdown, shutdown_flag,
};
pub use sink::{JsonArraySink, LineSink, cleanup_tmp_files};
pub use stream::{
    ByteCounter, GzipReader, HttpConfig, SHARED_RUNTIME, build_http_client, is_gzip, open_input,
};
pub use triples::{DecodeStats, Term, Triple, TripleFormat, TripleStream, spawn_decoder};
