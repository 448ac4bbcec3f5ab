//! Periodic pool status reporting on a background thread.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use indicatif::ProgressBar;

use crate::pool::PoolStats;
use crate::progress::fmt_num;

/// Default reporting interval
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(10);

/// `Status: N processed. M running. K in queue.` where K is the outstanding
/// task count, marked ` (MAX)` while admission is at the cap.
pub fn format_status(stats: &PoolStats) -> String {
    let outstanding = fmt_num(stats.outstanding.min(stats.max_outstanding) as u64);
    let queued = if stats.is_saturated() {
        format!("{outstanding} (MAX)")
    } else {
        outstanding
    };
    format!(
        "Status: {} processed. {} running. {queued} in queue.",
        fmt_num(stats.completed),
        fmt_num(stats.active.min(stats.workers) as u64),
    )
}

/// Running monitor; stop it before reading final pool statistics.
pub struct MonitorHandle {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the monitor thread and wait for it.
    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            log::warn!("status monitor thread panicked");
        }
    }
}

/// Log `format_status(sample())` every `interval` until stopped.
///
/// The same line is mirrored to `status_line` (a hidden bar outside a TTY).
pub fn spawn_monitor<F>(
    sample: F,
    interval: Duration,
    status_line: ProgressBar,
) -> std::io::Result<MonitorHandle>
where
    F: Fn() -> PoolStats + Send + 'static,
{
    let (stop, rx) = mpsc::channel::<()>();
    let handle = std::thread::Builder::new()
        .name("status-monitor".into())
        .spawn(move || loop {
            match rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let line = format_status(&sample());
                    status_line.set_message(line.clone());
                    log::info!("{line}");
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    status_line.finish_and_clear();
                    break;
                }
            }
        })?;
    Ok(MonitorHandle { stop, handle })
}
