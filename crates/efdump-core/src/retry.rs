//! Fixed-delay retry policy for per-task resubmission.
//!
//! The policy only decides; rescheduling is done by the worker pool so that
//! retries go through the same concurrency limits as first attempts.

use std::time::Duration;

/// Default number of resubmissions after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before a resubmitted task becomes runnable
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// What to do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resubmit after the given delay
    Retry(Duration),
    /// Terminal failure
    GiveUp,
}

/// Retry cap and delay.
///
/// `attempt` is zero-based: the first execution is attempt 0, so a task runs
/// at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Decide the fate of a failed attempt.
    pub fn decide(&self, attempt: u32, retryable: bool) -> RetryDecision {
        if retryable && attempt < self.max_retries {
            RetryDecision::Retry(self.delay)
        } else {
            RetryDecision::GiveUp
        }
    }
}
