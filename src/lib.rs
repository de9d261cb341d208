//! # BTC Rate Average Library
//!
//! Retrieves historical daily Bitcoin exchange rates for a trailing window of
//! days and computes their arithmetic mean.
//!
//! Each day is retrieved by its own task. Tasks run concurrently on a bounded
//! pool, retry with randomized exponential backoff when the price API reports
//! a rate limit, and push their result into a shared collector. The whole batch
//! is bounded by a single wall-clock deadline.
//!
//! ## Quick Start
//!
//! ```no_run
//! use btc_rate_average::downloader::{average_entries, BatchConfig, ResultCollector, WorkerPool};
//! use btc_rate_average::fetcher::cryptocompare::CryptoCompareFetcher;
//! use btc_rate_average::Currency;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BatchConfig::default()
//!     .with_total_days(30)
//!     .with_currency(Currency::Eur);
//!
//! let fetcher = Arc::new(CryptoCompareFetcher::new());
//! let report = WorkerPool::new(config)?
//!     .run(fetcher, ResultCollector::new())
//!     .await?;
//!
//! let average = average_entries(&report.entries)?;
//! println!("{}", Currency::Eur.format(average));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - One request per attempt, classified into an [`fetcher::AttemptOutcome`]
//! - [`downloader`] - Backoff, per-day retry tasks, result collection, worker pool, averaging
//! - [`cancel`] - Cooperative cancellation shared by the pool and its tasks
//! - [`metrics`] - Counters for attempts, rate limits and day outcomes
//! - [`cli`] - Command line front-end

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cooperative cancellation
pub mod cancel;

/// CLI command implementation
pub mod cli;

/// Batch retrieval orchestration
pub mod downloader;

/// Rate fetchers
pub mod fetcher;

/// Observability metrics
pub mod metrics;

pub use cancel::CancellationToken;

/// Quote currency for the Bitcoin exchange rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// US dollar
    #[default]
    #[serde(rename = "USD")]
    Usd,
    /// Euro
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    /// Identifier used by the price API (`tsym` parameter and response key).
    pub fn id(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    /// Render an amount with two decimals in the currency's display format.
    pub fn format(&self, value: f64) -> String {
        match self {
            Currency::Usd => format!("${value:.2}"),
            Currency::Eur => format!("{value:.2} €"),
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "usd" | "dollar" => Ok(Currency::Usd),
            "eur" | "euro" => Ok(Currency::Eur),
            _ => Err(format!("Invalid currency: {s}. Valid options: usd, eur")),
        }
    }
}

/// One successfully retrieved daily rate.
///
/// Entries are only built from a successful fetch and are never modified
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    label: String,
    day: u32,
    rate: f64,
    currency: Currency,
}

impl Entry {
    /// Create an entry for the given day offset (1 = yesterday).
    pub fn new(day: u32, rate: f64, currency: Currency) -> Self {
        Self {
            label: format!("Day {day}"),
            day,
            rate,
            currency,
        }
    }

    /// Display label, e.g. "Day 3".
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Day offset counted back from today.
    pub fn day(&self) -> u32 {
        self.day
    }

    /// Retrieved rate, in units of [`Entry::currency`] per bitcoin.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Quote currency of the rate.
    pub fn currency(&self) -> Currency {
        self.currency
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.label, self.currency.format(self.rate))
    }
}
