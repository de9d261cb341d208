//! CLI command implementation

pub mod average;
pub mod error;

pub use average::{Cli, OutputFormat, RunSummary};
pub use error::CliError;
