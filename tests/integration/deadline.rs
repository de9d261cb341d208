//! Global deadline and cancellation behavior

use std::sync::Arc;
use std::time::{Duration, Instant};

use btc_rate_average::downloader::{
    average_entries, BackoffPolicy, BatchConfig, BatchError, DayOutcome, RandomSource,
    ResultCollector, WorkerPool,
};
use btc_rate_average::CancellationToken;

use crate::support::{today, ScriptedFetcher, Step};

/// Always draws the longest allowed delay
struct LargestDelay;

impl RandomSource for LargestDelay {
    fn next_below(&self, bound: u64) -> u64 {
        bound - 1
    }
}

fn config(days: u32, timeout: Duration) -> BatchConfig {
    BatchConfig::default()
        .with_total_days(days)
        .with_global_timeout(timeout)
        .with_backoff_unit(Duration::from_millis(1))
        .with_concurrency(8)
}

#[tokio::test]
async fn stuck_days_trigger_batch_timeout_with_partial_entries() {
    let fetcher = ScriptedFetcher::new(today(), Step::Rate(30.0))
        .script(2, vec![Step::Hang])
        .script(4, vec![Step::Hang]);

    let started = Instant::now();
    let result = WorkerPool::new(config(5, Duration::from_millis(300)))
        .unwrap()
        .with_today(today())
        .run(Arc::new(fetcher), ResultCollector::new())
        .await;

    // Hanging fetches ignore cancellation; the pool must still return
    assert!(started.elapsed() < Duration::from_secs(5));

    match result {
        Err(BatchError::Timeout {
            collected,
            pending,
            entries,
            outcomes,
            elapsed,
        }) => {
            assert_eq!(collected, 3);
            assert_eq!(pending, 2);
            assert_eq!(entries.len(), 3);
            assert_eq!(average_entries(&entries).unwrap(), 30.0);
            let days: Vec<u32> = outcomes.iter().map(|(day, _)| *day).collect();
            assert_eq!(days, vec![1, 3, 5]);
            assert!(elapsed >= Duration::from_millis(300));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_error_message_reports_collected_count() {
    let fetcher = ScriptedFetcher::new(today(), Step::Hang).script(1, vec![Step::Rate(1.0)]);

    let err = WorkerPool::new(config(3, Duration::from_millis(200)))
        .unwrap()
        .with_today(today())
        .run(Arc::new(fetcher), ResultCollector::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Not terminated, only 1 computed so far");
}

#[tokio::test]
async fn no_timeout_when_every_task_finishes_in_time() {
    let fetcher = ScriptedFetcher::new(today(), Step::Rate(1.0)).script(3, vec![Step::Fail]);

    let result = WorkerPool::new(config(5, Duration::from_secs(5)))
        .unwrap()
        .with_today(today())
        .run(Arc::new(fetcher), ResultCollector::new())
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn deadline_cuts_long_backoff_short() {
    // Delay before the second attempt is just under one unit = 60 s
    let fetcher = ScriptedFetcher::new(today(), Step::RateLimited);
    let backoff = BackoffPolicy::new(Duration::from_secs(60), Arc::new(LargestDelay));

    let started = Instant::now();
    let result = WorkerPool::new(config(2, Duration::from_millis(200)))
        .unwrap()
        .with_today(today())
        .with_backoff(backoff)
        .run(Arc::new(fetcher), ResultCollector::new())
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(
        result,
        Err(BatchError::Timeout {
            collected: 0,
            pending: 2,
            ..
        })
    ));
}

#[tokio::test]
async fn parent_cancellation_aborts_days_without_failing_batch() {
    let fetcher = ScriptedFetcher::new(today(), Step::RateLimited).script(1, vec![Step::Rate(9.0)]);
    let shutdown = CancellationToken::new();

    let pool = WorkerPool::new(
        config(3, Duration::from_secs(10)).with_backoff_unit(Duration::from_secs(30)),
    )
    .unwrap()
    .with_today(today())
    .with_cancellation(shutdown.clone());

    let canceller = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.cancel();
        }
    });

    let report = pool
        .run(Arc::new(fetcher), ResultCollector::new())
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].rate(), 9.0);
    for (day, outcome) in &report.outcomes[1..] {
        assert!(
            matches!(outcome, DayOutcome::Aborted { .. } | DayOutcome::Exhausted { .. }),
            "day {day} ended as {outcome:?}"
        );
    }
}
