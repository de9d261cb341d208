//! Batch configuration and default constants

use crate::downloader::BatchError;
use crate::Currency;
use std::time::Duration;

/// Number of trailing days retrieved by default.
pub const DEFAULT_TOTAL_DAYS: u32 = 50;

/// Wall-clock budget for the whole batch, in seconds.
pub const DEFAULT_GLOBAL_TIMEOUT_SECS: u64 = 10;

/// Attempts allowed per day before the day is given up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Backoff scale: the delay bound before attempt `a` is `(2^a - 1)` units.
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 100;

/// Upper limit accepted for `total_days`.
pub const MAX_TOTAL_DAYS: u32 = 2_000;

/// Upper limit accepted for `global_timeout`, in seconds (one day).
pub const MAX_GLOBAL_TIMEOUT_SECS: u64 = 86_400;

/// Concurrency used when none is configured: one task per available core.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Parameters of one retrieval batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Days to retrieve, counted back from yesterday
    pub total_days: u32,
    /// Deadline for the whole batch, measured from pool start
    pub global_timeout: Duration,
    /// Retry ceiling per day
    pub max_attempts_per_day: u32,
    /// Quote currency
    pub currency: Currency,
    /// Backoff scale
    pub backoff_unit: Duration,
    /// Maximum number of day tasks in flight at once
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            total_days: DEFAULT_TOTAL_DAYS,
            global_timeout: Duration::from_secs(DEFAULT_GLOBAL_TIMEOUT_SECS),
            max_attempts_per_day: DEFAULT_MAX_ATTEMPTS,
            currency: Currency::default(),
            backoff_unit: Duration::from_millis(DEFAULT_BACKOFF_UNIT_MS),
            concurrency: default_concurrency(),
        }
    }
}

impl BatchConfig {
    /// Set the number of days
    pub fn with_total_days(mut self, total_days: u32) -> Self {
        self.total_days = total_days;
        self
    }

    /// Set the batch deadline
    pub fn with_global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout = timeout;
        self
    }

    /// Set the per-day retry ceiling
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts_per_day = max_attempts;
        self
    }

    /// Set the quote currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Set the backoff scale
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Set the concurrency bound
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Reject configurations the pool cannot run
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.total_days == 0 || self.total_days > MAX_TOTAL_DAYS {
            return Err(BatchError::InvalidConfig(format!(
                "total_days must be between 1 and {MAX_TOTAL_DAYS}, got {}",
                self.total_days
            )));
        }
        if self.max_attempts_per_day == 0 {
            return Err(BatchError::InvalidConfig(
                "max_attempts_per_day must be at least 1".to_string(),
            ));
        }
        if self.global_timeout.is_zero()
            || self.global_timeout > Duration::from_secs(MAX_GLOBAL_TIMEOUT_SECS)
        {
            return Err(BatchError::InvalidConfig(format!(
                "global_timeout must be non-zero and at most {MAX_GLOBAL_TIMEOUT_SECS} s, got {:?}",
                self.global_timeout
            )));
        }
        if self.concurrency == 0 {
            return Err(BatchError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
