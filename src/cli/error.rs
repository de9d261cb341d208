//! CLI error types and conversions

use crate::downloader::{AggregateError, BatchError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Batch did not complete
    #[error("{0}")]
    Batch(#[from] BatchError),

    /// Nothing to average
    #[error("no rate retrieved: {0}")]
    Aggregate(#[from] AggregateError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
