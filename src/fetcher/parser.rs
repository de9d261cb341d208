//! CryptoCompare response parser
//!
//! Stateless classification of a raw `data/dayAvg` response body into an
//! [`AttemptOutcome`]. Kept separate from the HTTP client so it can be tested
//! without a network.

use crate::fetcher::{AttemptOutcome, FetcherError, FetcherResult};
use crate::Currency;
use serde_json::Value;

/// Marker the API embeds in the body when it rejects a request for exceeding
/// its rate limit. The misspelling is the API's own.
pub const RATE_LIMIT_MARKER: &str = "Rate limit excedeed!";

/// Stateless parser for CryptoCompare responses
pub struct DayAvgParser;

impl DayAvgParser {
    /// Classify a response body.
    ///
    /// A body carrying [`RATE_LIMIT_MARKER`] is `RateLimited` regardless of
    /// anything else it contains; otherwise the body must be a JSON object
    /// with a numeric field named after the currency ID.
    pub fn classify(body: &str, currency: Currency) -> AttemptOutcome {
        if Self::is_rate_limited(body) {
            return AttemptOutcome::RateLimited;
        }
        Self::parse_rate(body, currency).into()
    }

    /// Whether the body signals a rate-limit rejection.
    pub fn is_rate_limited(body: &str) -> bool {
        body.contains(RATE_LIMIT_MARKER)
    }

    /// Extract the rate for `currency` from a `{"USD": 1234.5, ...}` body.
    ///
    /// # Errors
    /// `ParseError` when the body is not JSON, `InvalidResponse` when the
    /// currency field is missing or not a finite number.
    pub fn parse_rate(body: &str, currency: Currency) -> FetcherResult<f64> {
        let json: Value = serde_json::from_str(body)
            .map_err(|e| FetcherError::ParseError(format!("Invalid JSON response: {e}")))?;

        let field = json.get(currency.id()).ok_or_else(|| {
            FetcherError::InvalidResponse(format!(
                "Missing field {} in response: {}",
                currency.id(),
                truncate(body)
            ))
        })?;

        let rate = match field {
            Value::Number(n) => n.as_f64(),
            // Some proxies stringify numbers
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            FetcherError::InvalidResponse(format!(
                "Field {} is not numeric: {}",
                currency.id(),
                field
            ))
        })?;

        if !rate.is_finite() {
            return Err(FetcherError::InvalidResponse(format!(
                "Field {} is not finite: {rate}",
                currency.id()
            )));
        }

        Ok(rate)
    }
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
