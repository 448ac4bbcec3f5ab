//! HTTP client setup and gzip file streaming.
//!
//! HTTP goes through async reqwest on a shared tokio runtime; workers are
//! plain threads that `block_on` each request, so the pool's thread count
//! is the real concurrency limit.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use flate2::read::MultiGzDecoder;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default whole-request timeout (connect + headers + body)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport settings for the lookup client
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Idle keep-alive connections per host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: concat!("efdump/", env!("CARGO_PKG_VERSION")).to_string(),
            pool_max_idle_per_host: 32,
        }
    }
}

/// Build an async HTTP client (redirects followed, default policy).
pub fn build_http_client(config: &HttpConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.clone())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("efdump-io")
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Buffer size for gzip stream reader (256KB)
const GZIP_BUF_SIZE: usize = 256 * 1024;

/// Buffered, decompressing reader over a local file with byte counting
pub type GzipReader = BufReader<Box<dyn Read + Send>>;

/// Shared byte counter for progress tracking
pub type ByteCounter = Arc<AtomicU64>;

/// Open a local file for streaming, gunzipping when `gzip` is set.
///
/// Multi-member archives are read to the end. The counter tracks
/// *compressed* bytes consumed, so it can be compared with the file size.
///
/// Returns (reader, byte_counter, file_size)
pub fn open_input(path: &Path, gzip: bool) -> io::Result<(GzipReader, ByteCounter, u64)> {
    let file = File::open(path)?;
    let total_bytes = file.metadata()?.len();

    let counter = Arc::new(AtomicU64::new(0));
    let counting = CountingReader {
        inner: file,
        count: counter.clone(),
    };
    let inner: Box<dyn Read + Send> = if gzip {
        Box::new(MultiGzDecoder::new(counting))
    } else {
        Box::new(counting)
    };

    Ok((
        BufReader::with_capacity(GZIP_BUF_SIZE, inner),
        counter,
        total_bytes,
    ))
}

/// Whether a path names a gzip archive (by extension)
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Reader wrapper that tracks bytes read
pub struct CountingReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}
