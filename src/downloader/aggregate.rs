//! Average of collected rates

use crate::Entry;

/// Partial sums are taken over chunks of this size and then combined.
const CHUNK_SIZE: usize = 64;

/// Aggregation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregateError {
    /// Mean of an empty set is undefined
    #[error("cannot average an empty set of rates")]
    Empty,
}

/// Arithmetic mean of `rates`.
///
/// The sum is built from per-chunk partial sums, which only relies on
/// addition being associative and commutative; results for the same multiset
/// in a different order agree up to floating-point rounding.
///
/// # Errors
/// [`AggregateError::Empty`] when `rates` is empty.
pub fn average(rates: &[f64]) -> Result<f64, AggregateError> {
    if rates.is_empty() {
        return Err(AggregateError::Empty);
    }

    let sum: f64 = rates
        .chunks(CHUNK_SIZE)
        .map(|chunk| chunk.iter().sum::<f64>())
        .sum();

    Ok(sum / rates.len() as f64)
}

/// Arithmetic mean of the entries' rates.
pub fn average_entries(entries: &[Entry]) -> Result<f64, AggregateError> {
    let rates: Vec<f64> = entries.iter().map(Entry::rate).collect();
    average(&rates)
}
