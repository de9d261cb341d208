//! CryptoCompare `data/dayAvg` fetcher
//!
//! Issues one GET per call:
//! `{base_url}/data/dayAvg?fsym=BTC&tsym={currency}&toTs={timestamp}`
//! and hands the body to [`DayAvgParser`] for classification.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::fetcher::parser::DayAvgParser;
use crate::fetcher::shared_resources::global_http_client;
use crate::fetcher::{AttemptOutcome, FetcherError, RateFetcher};
use crate::Currency;

/// Default public endpoint of the price API
pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

const DAY_AVG_ENDPOINT: &str = "/data/dayAvg";
const BASE_ASSET: &str = "BTC";

/// Fetches the daily average BTC rate from CryptoCompare
pub struct CryptoCompareFetcher {
    client: Arc<Client>,
    base_url: String,
}

impl CryptoCompareFetcher {
    /// Create a fetcher using the shared HTTP client and the public endpoint
    pub fn new() -> Self {
        Self::with_client(global_http_client(), DEFAULT_BASE_URL)
    }

    /// Create a fetcher with an explicit client and base URL
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (Arc for cheap cloning)
    /// * `base_url` - Scheme and host, without trailing slash
    pub fn with_client(client: Arc<Client>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL for the endpoint
    pub fn endpoint_url(&self) -> String {
        format!("{}{}", self.base_url, DAY_AVG_ENDPOINT)
    }

    /// Query parameters for one day
    pub fn query_params(timestamp: i64, currency: Currency) -> [(&'static str, String); 3] {
        [
            ("fsym", BASE_ASSET.to_string()),
            ("tsym", currency.id().to_string()),
            ("toTs", timestamp.to_string()),
        ]
    }

    async fn request(&self, timestamp: i64, currency: Currency) -> AttemptOutcome {
        let url = self.endpoint_url();
        let params = Self::query_params(timestamp, currency);

        debug!(url = %url, timestamp = timestamp, currency = %currency, "Requesting day average");

        let response = match self.client.get(&url).query(&params).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return AttemptOutcome::Failure(FetcherError::NetworkError(e.to_string()));
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(timestamp = timestamp, "Rate limit error (429)");
            return AttemptOutcome::RateLimited;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return AttemptOutcome::Failure(FetcherError::NetworkError(format!(
                    "Failed to read response body: {e}"
                )));
            }
        };

        // The API reports its rate limit in the body, sometimes with a 200
        if DayAvgParser::is_rate_limited(&body) {
            return AttemptOutcome::RateLimited;
        }

        if !status.is_success() {
            return AttemptOutcome::Failure(FetcherError::HttpError(format!(
                "Unexpected status {status}"
            )));
        }

        DayAvgParser::classify(&body, currency)
    }
}

impl Default for CryptoCompareFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateFetcher for CryptoCompareFetcher {
    async fn fetch(
        &self,
        timestamp: i64,
        currency: Currency,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        if cancel.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        let outcome = tokio::select! {
            outcome = self.request(timestamp, currency) => outcome,
            _ = cancel.cancelled() => return AttemptOutcome::Cancelled,
        };

        if cancel.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }
        outcome
    }
}
