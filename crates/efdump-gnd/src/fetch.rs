//! Fetch task execution: one lookup, classification, and hand-off to the
//! language's output channel.

use std::path::PathBuf;
use std::sync::Arc;

use efdump_core::{RetryDecision, RetryPolicy, TaskOutcome};

use crate::client::{Fetch, FetchError, Rejection};
use crate::output::{self, OutputChannel, OutputChannels};

/// One (identifier, language) lookup. `attempt` is zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub identifier: Arc<str>,
    pub language: Arc<str>,
    pub attempt: u32,
}

impl FetchTask {
    pub fn new(identifier: Arc<str>, language: Arc<str>) -> Self {
        Self {
            identifier,
            language,
            attempt: 0,
        }
    }

    fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

/// Runs fetch tasks on pool workers
pub struct FetchHandler<F> {
    fetcher: Arc<F>,
    channels: Arc<OutputChannels>,
    policy: RetryPolicy,
    faulty_dir: Option<PathBuf>,
}

impl<F: Fetch> FetchHandler<F> {
    pub fn new(
        fetcher: Arc<F>,
        channels: Arc<OutputChannels>,
        policy: RetryPolicy,
        faulty_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            channels,
            policy,
            faulty_dir,
        }
    }

    /// Execute one attempt and decide the task's fate.
    pub fn handle(&self, task: FetchTask) -> TaskOutcome<FetchTask> {
        let Some(channel) = self.channels.get(&task.language) else {
            log::error!(
                "{} ({}): no output channel for language",
                task.identifier,
                task.language
            );
            return TaskOutcome::Done;
        };

        match self.fetcher.fetch(&task.identifier, &task.language) {
            Ok(doc) => {
                match channel.sink.append_raw(doc.as_bytes()) {
                    Ok(()) => {
                        channel.stats.record_success();
                        log::debug!(
                            "{}: successfully written to {} dump file",
                            task.identifier,
                            task.language
                        );
                    }
                    Err(e) => {
                        channel.stats.record_failure();
                        log::error!(
                            "{} ({}): writing data failed: {e}",
                            task.identifier,
                            task.language
                        );
                    }
                }
                TaskOutcome::Done
            }
            Err(err) => self.on_error(task, channel, &err),
        }
    }

    fn on_error(&self, task: FetchTask, channel: &OutputChannel, err: &FetchError) -> TaskOutcome<FetchTask> {
        let attempts = task.attempt + 1;
        match err.rejection() {
            Some(Rejection::NotSupported) => {
                log::warn!(
                    "{} ({}): {err}. {attempts} attempt(s)",
                    task.identifier,
                    task.language
                );
                channel.stats.record_rejected();
                return TaskOutcome::Done;
            }
            Some(Rejection::NotFound) => {
                log::error!(
                    "{} ({}): {err}. {attempts} attempt(s)",
                    task.identifier,
                    task.language
                );
                channel.stats.record_rejected();
                return TaskOutcome::Done;
            }
            None => {}
        }

        match self.policy.decide(task.attempt, err.is_retryable()) {
            RetryDecision::Retry(delay) => {
                log::warn!(
                    "{} ({}): {err}. {attempts} attempt(s), retrying in {:.1}s",
                    task.identifier,
                    task.language,
                    delay.as_secs_f64()
                );
                channel.stats.record_retry();
                TaskOutcome::Retry {
                    task: task.next_attempt(),
                    delay,
                }
            }
            RetryDecision::GiveUp => {
                log::error!(
                    "{} ({}): {err}. {attempts} attempt(s), giving up",
                    task.identifier,
                    task.language
                );
                channel.stats.record_failure();
                if let (FetchError::Malformed { body, .. }, Some(dir)) = (err, &self.faulty_dir) {
                    match output::save_faulty(dir, &task.identifier, &task.language, body) {
                        Ok(path) => log::info!("Faulty response saved to {}", path.display()),
                        Err(e) => log::error!("Could not save faulty response: {e}"),
                    }
                }
                TaskOutcome::Done
            }
        }
    }
}
