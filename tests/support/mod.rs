//! Scripted fetcher shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use btc_rate_average::fetcher::{day_start_timestamp, AttemptOutcome, FetcherError, RateFetcher};
use btc_rate_average::{CancellationToken, Currency};
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// What the fake API does on one call
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Answer with a rate
    Rate(f64),
    /// Reject with the rate-limit marker
    RateLimited,
    /// Unparseable answer
    Fail,
    /// Never answer, ignoring cancellation
    Hang,
}

/// Fake price API keyed by day offset
pub struct ScriptedFetcher {
    today: NaiveDate,
    scripts: Mutex<HashMap<u32, VecDeque<Step>>>,
    fallback: Step,
    calls: Mutex<HashMap<u32, u32>>,
}

impl ScriptedFetcher {
    /// Every call not covered by a script gets `fallback`
    pub fn new(today: NaiveDate, fallback: Step) -> Self {
        Self {
            today,
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Script the calls for one day; later calls use the fallback
    pub fn script(self, day: u32, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(day, steps.into());
        self
    }

    /// Calls received for `day`
    pub fn calls(&self, day: u32) -> u32 {
        self.calls.lock().unwrap().get(&day).copied().unwrap_or(0)
    }

    fn day_of(&self, timestamp: i64) -> u32 {
        ((day_start_timestamp(self.today, 0) - timestamp) / 86_400) as u32
    }
}

#[async_trait]
impl RateFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        timestamp: i64,
        _currency: Currency,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        if cancel.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        let day = self.day_of(timestamp);
        *self.calls.lock().unwrap().entry(day).or_insert(0) += 1;
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&day)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.fallback);

        match step {
            Step::Rate(rate) => AttemptOutcome::Success(rate),
            Step::RateLimited => AttemptOutcome::RateLimited,
            Step::Fail => AttemptOutcome::Failure(FetcherError::ParseError("not json".into())),
            Step::Hang => std::future::pending::<AttemptOutcome>().await,
        }
    }
}

/// Fixed reference date used by the tests
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}
