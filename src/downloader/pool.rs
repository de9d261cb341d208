//! Bounded worker pool with a single batch deadline
//!
//! Spawns one [`RetryingTask`] per day into a [`JoinSet`], bounds the number
//! running at once with a semaphore, and waits for all of them until the
//! batch deadline. When the deadline elapses first, cancellation is broadcast,
//! every remaining task is aborted, and the call fails with
//! [`BatchError::Timeout`].

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::downloader::aggregate::{average_entries, AggregateError};
use crate::downloader::backoff::BackoffPolicy;
use crate::downloader::collector::ResultCollector;
use crate::downloader::config::BatchConfig;
use crate::downloader::task::{DayOutcome, RetryingTask};
use crate::downloader::BatchError;
use crate::fetcher::RateFetcher;
use crate::metrics::BatchMetrics;
use crate::Entry;

/// Callback invoked on the caller's task each time a day reaches a terminal state
pub type DayCompleteHook = Arc<dyn Fn(u32, &DayOutcome) + Send + Sync>;

/// Result of a batch in which every day reached a terminal state
#[derive(Debug)]
pub struct BatchReport {
    /// Days requested
    pub requested: u32,
    /// Entries collected, in completion order
    pub entries: Vec<Entry>,
    /// Terminal state per day, sorted by day
    pub outcomes: Vec<(u32, DayOutcome)>,
    /// Wall-clock time from pool start to the last task
    pub elapsed: Duration,
}

impl BatchReport {
    /// Mean of the collected rates
    pub fn average(&self) -> Result<f64, AggregateError> {
        average_entries(&self.entries)
    }

    /// Number of days that ended in the given state (see [`DayOutcome::kind`])
    pub fn count(&self, kind: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.kind() == kind)
            .count()
    }

    /// Total fetch calls made across all days
    pub fn total_attempts(&self) -> u32 {
        self.outcomes.iter().map(|(_, o)| o.attempts()).sum()
    }
}

/// Runs one retrieval batch
pub struct WorkerPool {
    config: BatchConfig,
    backoff: BackoffPolicy,
    today: Option<NaiveDate>,
    parent_cancel: Option<CancellationToken>,
    on_day_complete: Option<DayCompleteHook>,
}

impl WorkerPool {
    /// Create a pool for a validated configuration
    pub fn new(config: BatchConfig) -> Result<Self, BatchError> {
        config.validate()?;
        let backoff = BackoffPolicy::with_unit(config.backoff_unit);
        Ok(Self {
            config,
            backoff,
            today: None,
            parent_cancel: None,
            on_day_complete: None,
        })
    }

    /// Replace the backoff policy (e.g. with a seeded random source)
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fix the reference date instead of using today's UTC date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Also abort tasks when `parent` is cancelled (e.g. on Ctrl+C)
    ///
    /// A parent cancellation does not fail the batch: affected days end as
    /// [`DayOutcome::Aborted`] and the report carries whatever was collected.
    pub fn with_cancellation(mut self, parent: CancellationToken) -> Self {
        self.parent_cancel = Some(parent);
        self
    }

    /// Register a per-day completion callback
    pub fn on_day_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(u32, &DayOutcome) + Send + Sync + 'static,
    {
        self.on_day_complete = Some(Arc::new(hook));
        self
    }

    /// Run every day task and wait for them until the batch deadline.
    ///
    /// # Errors
    /// [`BatchError::Timeout`] when the deadline elapses before every task
    /// reaches a terminal state.
    pub async fn run(
        &self,
        fetcher: Arc<dyn RateFetcher>,
        collector: ResultCollector,
    ) -> Result<BatchReport, BatchError> {
        let requested = self.config.total_days;
        let metrics = BatchMetrics::start(requested);
        let started = Instant::now();
        let deadline = started
            .checked_add(self.config.global_timeout)
            .ok_or_else(|| {
                BatchError::InvalidConfig(format!(
                    "global_timeout {:?} overflows the clock",
                    self.config.global_timeout
                ))
            })?;
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());

        let cancel = match &self.parent_cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let permits = Arc::new(Semaphore::new(self.config.concurrency));

        info!(
            days = requested,
            concurrency = self.config.concurrency,
            timeout_ms = self.config.global_timeout.as_millis(),
            currency = %self.config.currency,
            "Add retrieval tasks for the last {} days",
            requested
        );

        let mut tasks = JoinSet::new();
        for day in 1..=requested {
            let task = RetryingTask::new(day, today, &self.config, self.backoff.for_day(day));
            let fetcher = fetcher.clone();
            let collector = collector.clone();
            let cancel = cancel.clone();
            let permits = permits.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    permit = permits.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (day, DayOutcome::Aborted { attempts: 0 }),
                    },
                    _ = cancel.cancelled() => return (day, DayOutcome::Aborted { attempts: 0 }),
                };
                let outcome = task.run(fetcher.as_ref(), &collector, &cancel).await;
                (day, outcome)
            });
        }

        debug!("Wait for termination");

        let mut outcomes = Vec::with_capacity(requested as usize);
        let mut finished: u32 = 0;
        let drained = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = tasks.join_next().await {
                finished += 1;
                match joined {
                    Ok((day, outcome)) => {
                        if let Some(hook) = &self.on_day_complete {
                            hook(day, &outcome);
                        }
                        outcomes.push((day, outcome));
                    }
                    Err(e) => error!(error = %e, "Day task did not complete"),
                }
            }
        })
        .await;

        outcomes.sort_by_key(|(day, _)| *day);

        if drained.is_err() {
            cancel.cancel();
            tasks.abort_all();

            let entries = collector.snapshot();
            let pending = requested.saturating_sub(finished);
            metrics.record_timeout(entries.len());
            warn!(
                collected = entries.len(),
                pending = pending,
                "Batch deadline elapsed, remaining tasks cancelled"
            );
            return Err(BatchError::Timeout {
                collected: entries.len(),
                pending,
                entries,
                outcomes,
                elapsed: started.elapsed(),
            });
        }

        let entries = collector.snapshot();
        metrics.record_complete(entries.len());
        info!("Properly terminated with {} entries", entries.len());

        Ok(BatchReport {
            requested,
            entries,
            outcomes,
            elapsed: started.elapsed(),
        })
    }
}
