//! Rate fetcher implementations
//!
//! A fetcher performs exactly one request per call and classifies the result
//! into an [`AttemptOutcome`]. Retrying is the caller's business (see
//! [`crate::downloader::task`]).

use crate::cancel::CancellationToken;
use crate::Currency;
use async_trait::async_trait;
use chrono::NaiveDate;

pub mod cryptocompare;
pub mod parser;
pub mod shared_resources;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP request could not be completed
    #[error("network error: {0}")]
    NetworkError(String),

    /// Server answered with a non-success status
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response body is not valid JSON
    #[error("parse error: {0}")]
    ParseError(String),

    /// Response is valid JSON but lacks a numeric rate for the currency
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Classification of a single fetch attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The API returned a rate for the requested day and currency
    Success(f64),
    /// The API rejected the request because of its rate limit; retry later
    RateLimited,
    /// Transport or parse failure; not retried
    Failure(FetcherError),
    /// Cancellation was observed before or after the request
    Cancelled,
}

impl AttemptOutcome {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::RateLimited => "rate_limited",
            AttemptOutcome::Failure(_) => "failure",
            AttemptOutcome::Cancelled => "cancelled",
        }
    }
}

impl From<FetcherResult<f64>> for AttemptOutcome {
    fn from(result: FetcherResult<f64>) -> Self {
        match result {
            Ok(rate) => AttemptOutcome::Success(rate),
            Err(e) => AttemptOutcome::Failure(e),
        }
    }
}

/// Fetches the daily Bitcoin rate for one day.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Perform one request for the day starting at `timestamp` (Unix seconds, UTC).
    ///
    /// Implementations never panic: every failure path maps onto an
    /// [`AttemptOutcome`] variant. `cancel` should be checked before the
    /// request and may interrupt it.
    async fn fetch(
        &self,
        timestamp: i64,
        currency: Currency,
        cancel: &CancellationToken,
    ) -> AttemptOutcome;
}

/// Unix timestamp (seconds) of 00:00:00 UTC, `day_offset` days before `today`.
pub fn day_start_timestamp(today: NaiveDate, day_offset: u32) -> i64 {
    let day = today - chrono::Duration::days(i64::from(day_offset));
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}
