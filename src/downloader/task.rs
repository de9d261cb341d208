//! Per-day retrieval task with retry and backoff
//!
//! A task moves `Idle -> Attempting` and ends in exactly one terminal
//! [`DayOutcome`]. Only a rate-limit rejection is retried; any other failure
//! ends the day without an entry, as does running out of attempts.

use chrono::NaiveDate;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cancel::CancellationToken;
use crate::downloader::backoff::BackoffPolicy;
use crate::downloader::collector::ResultCollector;
use crate::downloader::config::BatchConfig;
use crate::fetcher::{day_start_timestamp, AttemptOutcome, FetcherError, RateFetcher};
use crate::metrics::{record_day_outcome, record_retry_backoff, AttemptMetrics};
use crate::{Currency, Entry};

/// Terminal state of a day task. `attempts` counts fetch calls actually made.
#[derive(Debug)]
pub enum DayOutcome {
    /// An entry for the day was appended to the collector
    Succeeded {
        /// Fetch calls made
        attempts: u32,
    },
    /// A rate was fetched but the collector already held an entry for the day
    Duplicate {
        /// Fetch calls made
        attempts: u32,
    },
    /// Every allowed attempt was rate limited
    Exhausted {
        /// Fetch calls made
        attempts: u32,
    },
    /// Cancellation was observed; partial work discarded
    Aborted {
        /// Fetch calls made
        attempts: u32,
    },
    /// Transport or parse failure; not retried
    Failed {
        /// Fetch calls made
        attempts: u32,
        /// Cause reported by the fetcher
        error: FetcherError,
    },
}

impl DayOutcome {
    /// Fetch calls made before reaching this state
    pub fn attempts(&self) -> u32 {
        match self {
            DayOutcome::Succeeded { attempts }
            | DayOutcome::Duplicate { attempts }
            | DayOutcome::Exhausted { attempts }
            | DayOutcome::Aborted { attempts }
            | DayOutcome::Failed { attempts, .. } => *attempts,
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DayOutcome::Succeeded { .. } => "succeeded",
            DayOutcome::Duplicate { .. } => "duplicate",
            DayOutcome::Exhausted { .. } => "exhausted",
            DayOutcome::Aborted { .. } => "aborted",
            DayOutcome::Failed { .. } => "failed",
        }
    }
}

/// Retrieval of one day's rate
#[derive(Debug, Clone)]
pub struct RetryingTask {
    day: u32,
    timestamp: i64,
    currency: Currency,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl RetryingTask {
    /// Build the task for `day` days before `today`; the target timestamp is
    /// fixed here, once.
    pub fn new(day: u32, today: NaiveDate, config: &BatchConfig, backoff: BackoffPolicy) -> Self {
        Self {
            day,
            timestamp: day_start_timestamp(today, day),
            currency: config.currency,
            max_attempts: config.max_attempts_per_day,
            backoff,
        }
    }

    /// Day offset this task retrieves
    pub fn day(&self) -> u32 {
        self.day
    }

    /// Target day-start timestamp (Unix seconds, UTC)
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Run attempts until a terminal state is reached
    pub async fn run(
        &self,
        fetcher: &dyn RateFetcher,
        collector: &ResultCollector,
        cancel: &CancellationToken,
    ) -> DayOutcome {
        let span = info_span!("retrieve_day", day = self.day, timestamp = self.timestamp);
        let outcome = self.attempt_loop(fetcher, collector, cancel).instrument(span).await;
        record_day_outcome(outcome.kind());
        outcome
    }

    async fn attempt_loop(
        &self,
        fetcher: &dyn RateFetcher,
        collector: &ResultCollector,
        cancel: &CancellationToken,
    ) -> DayOutcome {
        let mut attempts = 0;

        while attempts < self.max_attempts {
            if cancel.is_cancelled() {
                return DayOutcome::Aborted { attempts };
            }

            let delay = self.backoff.delay_for(attempts);
            if !delay.is_zero() {
                record_retry_backoff(delay, attempts);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {},
                    _ = cancel.cancelled() => return DayOutcome::Aborted { attempts },
                }
            }

            let metrics = AttemptMetrics::start(self.day, attempts + 1);
            let outcome = fetcher.fetch(self.timestamp, self.currency, cancel).await;
            attempts += 1;
            metrics.record(outcome.kind());

            match outcome {
                AttemptOutcome::Success(rate) => {
                    let entry = Entry::new(self.day, rate, self.currency);
                    let line = entry.to_string();
                    if collector.append(entry) {
                        info!(attempts = attempts, "{line}");
                        return DayOutcome::Succeeded { attempts };
                    }
                    warn!(attempts = attempts, "Entry for day already collected, dropping {line}");
                    return DayOutcome::Duplicate { attempts };
                }
                AttemptOutcome::RateLimited => {
                    debug!(
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        "Rate limited, retrying"
                    );
                }
                AttemptOutcome::Cancelled => return DayOutcome::Aborted { attempts },
                AttemptOutcome::Failure(error) => {
                    warn!(attempt = attempts, error = %error, "Retrieval failed");
                    return DayOutcome::Failed { attempts, error };
                }
            }
        }

        debug!(attempts = attempts, "Attempts exhausted without a rate");
        DayOutcome::Exhausted { attempts }
    }
}
