//! Randomized exponential backoff
//!
//! The first attempt of a day runs immediately. Before attempt `a >= 1` the
//! task sleeps for a delay drawn uniformly from `[0, (2^a - 1) * unit)`, so
//! concurrently retrying days spread out instead of hitting the API together.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Exponent cap: beyond this the bound stops growing.
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Source of uniformly distributed integers.
pub trait RandomSource: Send + Sync {
    /// Uniform value in `[0, bound)`. Callers guarantee `bound > 0`.
    fn next_below(&self, bound: u64) -> u64;

    /// Independent source for `stream`, or `None` to share this one.
    fn split(&self, _stream: u64) -> Option<Arc<dyn RandomSource>> {
        None
    }
}

/// Per-thread generator from [`rand::thread_rng`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_below(&self, bound: u64) -> u64 {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Odd constant (2^64 / golden ratio) spreading stream ids over the seed space
const STREAM_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Deterministic generator for reproducible runs
#[derive(Debug)]
pub struct SeededRandom {
    seed: u64,
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a generator from a fixed seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_below(&self, bound: u64) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..bound)
    }

    fn split(&self, stream: u64) -> Option<Arc<dyn RandomSource>> {
        let seed = self.seed ^ stream.wrapping_add(1).wrapping_mul(STREAM_MIX);
        Some(Arc::new(SeededRandom::new(seed)))
    }
}

/// Computes the wait before each attempt of a day task
#[derive(Clone)]
pub struct BackoffPolicy {
    unit: Duration,
    random: Arc<dyn RandomSource>,
}

impl BackoffPolicy {
    /// Policy with the given scale and random source
    pub fn new(unit: Duration, random: Arc<dyn RandomSource>) -> Self {
        Self { unit, random }
    }

    /// Policy with the given scale and a per-thread random source
    pub fn with_unit(unit: Duration) -> Self {
        Self::new(unit, Arc::new(ThreadRandom))
    }

    /// Policy for one day task.
    ///
    /// A seeded source hands each day its own stream, so the delays a day
    /// sees do not depend on how the scheduler interleaves the other days.
    pub fn for_day(&self, day: u32) -> Self {
        match self.random.split(u64::from(day)) {
            Some(random) => Self::new(self.unit, random),
            None => self.clone(),
        }
    }

    /// Exclusive upper bound of the delay before `attempt` (0-based)
    pub fn bound_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let units = (1u64 << exponent) - 1;
        Duration::from_nanos(unit_nanos(self.unit).saturating_mul(units))
    }

    /// Randomized delay before `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let bound = self.bound_for(attempt).as_nanos() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.random.next_below(bound))
    }
}

fn unit_nanos(unit: Duration) -> u64 {
    u64::try_from(unit.as_nanos()).unwrap_or(u64::MAX)
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffPolicy")
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::with_unit(Duration::from_millis(
            crate::downloader::config::DEFAULT_BACKOFF_UNIT_MS,
        ))
    }
}
