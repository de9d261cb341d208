//! Batch retrieval orchestration
//!
//! This module runs one retrieval task per trailing day and reduces the
//! results to an average.
//!
//! # Overview
//!
//! 1. **Configuration**: describe the batch with [`config::BatchConfig`]
//! 2. **Backoff**: randomized exponential delays from [`backoff::BackoffPolicy`]
//! 3. **Per-day tasks**: [`task::RetryingTask`] retries rate-limited fetches
//! 4. **Collection**: successful entries land in [`collector::ResultCollector`]
//! 5. **Execution**: [`pool::WorkerPool`] bounds concurrency and enforces the deadline
//! 6. **Aggregation**: [`aggregate::average`] computes the mean
//!
//! # Quick Start
//!
//! ```no_run
//! use btc_rate_average::downloader::{BatchConfig, ResultCollector, WorkerPool};
//! use btc_rate_average::fetcher::cryptocompare::CryptoCompareFetcher;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = WorkerPool::new(BatchConfig::default())?;
//! let report = pool
//!     .run(Arc::new(CryptoCompareFetcher::new()), ResultCollector::new())
//!     .await?;
//! println!("{} entries, average {}", report.entries.len(), report.average()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Failures of a single attempt or a single day stay inside its task and show
//! up only in the report's outcomes. The batch itself fails only when its
//! deadline elapses ([`BatchError::Timeout`]) or its configuration is invalid.

pub mod aggregate;
pub mod backoff;
pub mod collector;
pub mod config;
pub mod pool;
pub mod task;

pub use aggregate::{average, average_entries, AggregateError};
pub use backoff::{BackoffPolicy, RandomSource, SeededRandom, ThreadRandom};
pub use collector::ResultCollector;
pub use config::BatchConfig;
pub use pool::{BatchReport, WorkerPool};
pub use task::{DayOutcome, RetryingTask};

use crate::Entry;
use std::time::Duration;

/// Batch-level errors
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The deadline elapsed before every day task finished
    #[error("Not terminated, only {collected} computed so far")]
    Timeout {
        /// Entries collected before the deadline
        collected: usize,
        /// Day tasks that had not finished
        pending: u32,
        /// The collected entries themselves
        entries: Vec<Entry>,
        /// Terminal states reached before the deadline, sorted by day
        outcomes: Vec<(u32, DayOutcome)>,
        /// Time from pool start to the deadline
        elapsed: Duration,
    },

    /// Configuration rejected before any task started
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
