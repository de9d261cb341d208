//! Observability metrics for batch rate retrieval
//!
//! Counters and histograms for fetch attempts, rate-limit rejections, backoff
//! waits and per-day outcomes. Recording is a no-op until [`init_metrics`]
//! installs the Prometheus exporter, so library users and tests pay nothing.

use metrics::{counter, describe_counter, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored once the exporter is installed.
///
/// # Arguments
/// * `addr` - Socket address to bind the scrape endpoint (e.g., "127.0.0.1:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "rate_fetch_attempts_total",
        Unit::Count,
        "Fetch attempts made against the price API, by outcome"
    );

    describe_histogram!(
        "rate_fetch_duration_seconds",
        Unit::Seconds,
        "Duration of a single fetch attempt"
    );

    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Backoff wait before a retry attempt"
    );

    describe_counter!(
        "day_outcomes_total",
        Unit::Count,
        "Terminal state reached by each day task"
    );

    describe_counter!(
        "batches_total",
        Unit::Count,
        "Batches run, by result (completed or timed_out)"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Times one fetch attempt
pub struct AttemptMetrics {
    day: u32,
    attempt: u32,
    start_time: Instant,
}

impl AttemptMetrics {
    /// Start timing an attempt (1-based attempt number)
    pub fn start(day: u32, attempt: u32) -> Self {
        Self {
            day,
            attempt,
            start_time: Instant::now(),
        }
    }

    /// Record the attempt's classified outcome
    pub fn record(&self, outcome: &'static str) {
        let duration = self.start_time.elapsed();

        counter!("rate_fetch_attempts_total", "outcome" => outcome).increment(1);
        histogram!("rate_fetch_duration_seconds").record(duration.as_secs_f64());

        debug!(
            day = self.day,
            attempt = self.attempt,
            outcome = outcome,
            duration_ms = duration.as_millis(),
            "Fetch attempt completed"
        );
    }
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());

    debug!(
        attempt = attempt,
        backoff_ms = duration.as_millis(),
        "Retry backoff recorded"
    );
}

/// Record the terminal state of one day task
pub fn record_day_outcome(outcome: &'static str) {
    counter!("day_outcomes_total", "outcome" => outcome).increment(1);
}

/// Batch-level metrics
pub struct BatchMetrics {
    requested: u32,
    start_time: Instant,
}

impl BatchMetrics {
    /// Start tracking a batch of `requested` day tasks
    pub fn start(requested: u32) -> Self {
        gauge!("batch_days_requested").set(f64::from(requested));
        Self {
            requested,
            start_time: Instant::now(),
        }
    }

    /// Record a batch in which every task reached a terminal state
    pub fn record_complete(&self, entries: usize) {
        counter!("batches_total", "result" => "completed").increment(1);
        gauge!("batch_entries_collected").set(entries as f64);

        info!(
            requested = self.requested,
            entries = entries,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Batch completed"
        );
    }

    /// Record a batch cut short by its deadline
    pub fn record_timeout(&self, entries: usize) {
        counter!("batches_total", "result" => "timed_out").increment(1);
        gauge!("batch_entries_collected").set(entries as f64);

        warn!(
            requested = self.requested,
            entries = entries,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Batch deadline elapsed"
        );
    }
}
