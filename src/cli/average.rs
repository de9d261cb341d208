//! Average command: retrieve the trailing window and print its mean

use crate::cancel::CancellationToken;
use crate::downloader::config::{
    DEFAULT_BACKOFF_UNIT_MS, DEFAULT_GLOBAL_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_TOTAL_DAYS, MAX_TOTAL_DAYS,
};
use crate::downloader::{
    BackoffPolicy, BatchConfig, BatchError, BatchReport, ResultCollector,
    SeededRandom, WorkerPool,
};
use crate::fetcher::cryptocompare::{CryptoCompareFetcher, DEFAULT_BASE_URL};
use crate::fetcher::shared_resources::global_http_client;
use crate::Currency;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::CliError;

/// Maximum allowed concurrency to avoid tripping the API's rate limit on our own
const MAX_CONCURRENCY: usize = 64;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Average Bitcoin exchange rate over the last days
#[derive(Parser, Debug)]
#[command(name = "btc-rate-average")]
#[command(about = "Average Bitcoin exchange rate over a trailing window of days", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Number of trailing days to retrieve
    #[arg(long, default_value_t = DEFAULT_TOTAL_DAYS, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TOTAL_DAYS)))]
    pub days: u32,

    /// Deadline for the whole batch, in seconds
    #[arg(long, default_value_t = DEFAULT_GLOBAL_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    /// Attempts allowed per day before giving it up
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=30))]
    pub max_attempts: u32,

    /// Quote currency (usd or eur)
    #[arg(long, default_value = "usd")]
    pub currency: Currency,

    /// Day tasks in flight at once (default: available parallelism, max: 64)
    #[arg(long, value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// Backoff scale in milliseconds
    #[arg(long, default_value_t = DEFAULT_BACKOFF_UNIT_MS)]
    pub backoff_unit_ms: u64,

    /// Seed for the backoff jitter; each day draws from its own seeded stream,
    /// so a day's retry delays repeat across runs with the same seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Price API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Output format (json or human)
    #[arg(long, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address while running
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// On timeout, still report the average of the entries collected so far
    #[arg(long, default_value_t = false)]
    pub allow_partial: bool,
}

impl Cli {
    /// Batch configuration described by the arguments
    pub fn batch_config(&self) -> BatchConfig {
        let config = BatchConfig::default()
            .with_total_days(self.days)
            .with_global_timeout(Duration::from_secs(self.timeout))
            .with_max_attempts(self.max_attempts)
            .with_currency(self.currency)
            .with_backoff_unit(Duration::from_millis(self.backoff_unit_ms));

        match self.concurrency {
            Some(concurrency) => config.with_concurrency(concurrency),
            None => config,
        }
    }

    fn backoff_policy(&self) -> BackoffPolicy {
        let unit = Duration::from_millis(self.backoff_unit_ms);
        match self.seed {
            Some(seed) => BackoffPolicy::new(unit, Arc::new(SeededRandom::new(seed))),
            None => BackoffPolicy::with_unit(unit),
        }
    }

    /// Run the batch and print its summary to stdout
    pub async fn execute(&self, shutdown: CancellationToken) -> Result<(), CliError> {
        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        let config = self.batch_config();
        let fetcher = Arc::new(CryptoCompareFetcher::with_client(
            global_http_client(),
            self.base_url.clone(),
        ));

        let progress = match self.output_format {
            OutputFormat::Human => create_progress_bar(config.total_days),
            OutputFormat::Json => ProgressBar::hidden(),
        };

        let hook_progress = progress.clone();
        let pool = WorkerPool::new(config)?
            .with_backoff(self.backoff_policy())
            .with_cancellation(shutdown)
            .on_day_complete(move |day, outcome| {
                hook_progress.inc(1);
                hook_progress.set_message(format!("day {day} {}", outcome.kind()));
            });

        let result = pool.run(fetcher, ResultCollector::new()).await;
        progress.finish_and_clear();

        match result {
            Ok(report) => {
                let summary = RunSummary::from_report(self.currency, &report)?;
                println!("{}", summary.render(self.output_format));
                Ok(())
            }
            Err(BatchError::Timeout {
                collected,
                pending,
                entries,
                outcomes,
                elapsed,
            }) => {
                let report = BatchReport {
                    requested: self.days,
                    entries,
                    outcomes,
                    elapsed,
                };
                if self.allow_partial {
                    match RunSummary::partial(self.currency, &report) {
                        Ok(summary) => println!("{}", summary.render(self.output_format)),
                        Err(e) => warn!(error = %e, "No partial average available"),
                    }
                }
                Err(CliError::Batch(BatchError::Timeout {
                    collected,
                    pending,
                    entries: report.entries,
                    outcomes: report.outcomes,
                    elapsed: report.elapsed,
                }))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Final result of a run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunSummary {
    /// Quote currency
    pub currency: Currency,
    /// Days requested
    pub requested_days: u32,
    /// Entries collected
    pub entries: usize,
    /// Days that exhausted their attempts
    pub exhausted: usize,
    /// Days that failed outright
    pub failed: usize,
    /// Mean of the collected rates
    pub average: f64,
    /// Whether every day task finished before the deadline
    pub complete: bool,
    /// Batch duration in milliseconds
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Summarize a completed batch
    pub fn from_report(currency: Currency, report: &BatchReport) -> Result<Self, CliError> {
        let average = report.average()?;
        Ok(Self {
            currency,
            requested_days: report.requested,
            entries: report.entries.len(),
            exhausted: report.count("exhausted"),
            failed: report.count("failed"),
            average,
            complete: true,
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Summarize the days that finished before a deadline
    ///
    /// Counts cover only days that reached a terminal state in time.
    pub fn partial(currency: Currency, report: &BatchReport) -> Result<Self, CliError> {
        Ok(Self {
            complete: false,
            ..Self::from_report(currency, report)?
        })
    }

    /// Render for stdout
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Human => {
                let header = if self.complete {
                    format!("Properly terminated with {} entries", self.entries)
                } else {
                    format!(
                        "Not terminated, partial result from {} of {} days",
                        self.entries, self.requested_days
                    )
                };
                format!("{header}\nAverage: {}", self.currency.format(self.average))
            }
            OutputFormat::Json => serde_json::to_string(self)
                .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}")),
        }
    }
}

/// Progress bar over the requested days
fn create_progress_bar(days: u32) -> ProgressBar {
    let pb = ProgressBar::new(u64::from(days));
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
