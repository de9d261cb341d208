//! End-to-end batch scenarios against a scripted price API

use std::sync::Arc;
use std::time::Duration;

use btc_rate_average::downloader::{
    average_entries, BackoffPolicy, BatchConfig, DayOutcome, ResultCollector, SeededRandom,
    WorkerPool,
};

use crate::support::{today, ScriptedFetcher, Step};

fn fast_pool(config: BatchConfig) -> WorkerPool {
    WorkerPool::new(config.with_backoff_unit(Duration::from_millis(1)))
        .unwrap()
        .with_today(today())
        .with_backoff(BackoffPolicy::new(
            Duration::from_millis(1),
            Arc::new(SeededRandom::new(1)),
        ))
}

#[tokio::test]
async fn three_days_all_succeed_average_is_mean() {
    let fetcher = ScriptedFetcher::new(today(), Step::RateLimited)
        .script(1, vec![Step::Rate(10.0)])
        .script(2, vec![Step::Rate(20.0)])
        .script(3, vec![Step::Rate(30.0)]);

    let report = fast_pool(BatchConfig::default().with_total_days(3))
        .run(Arc::new(fetcher), ResultCollector::new())
        .await
        .unwrap();

    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.average().unwrap(), 20.0);
    assert_eq!(average_entries(&report.entries).unwrap(), 20.0);
}

#[tokio::test]
async fn rate_limited_twice_then_success() {
    let fetcher = Arc::new(
        ScriptedFetcher::new(today(), Step::RateLimited).script(
            1,
            vec![Step::RateLimited, Step::RateLimited, Step::Rate(42.0)],
        ),
    );

    let report = fast_pool(BatchConfig::default().with_total_days(1))
        .run(fetcher.clone(), ResultCollector::new())
        .await
        .unwrap();

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].rate(), 42.0);
    assert!(matches!(
        report.outcomes[0],
        (1, DayOutcome::Succeeded { attempts: 3 })
    ));
    assert_eq!(fetcher.calls(1), 3);
}

#[tokio::test]
async fn always_rate_limited_day_is_dropped_but_batch_completes() {
    let fetcher = Arc::new(
        ScriptedFetcher::new(today(), Step::Rate(100.0)).script(
            2,
            vec![Step::RateLimited; 5],
        ),
    );

    let report = fast_pool(
        BatchConfig::default()
            .with_total_days(4)
            .with_max_attempts(5),
    )
    .run(fetcher.clone(), ResultCollector::new())
    .await
    .unwrap();

    assert_eq!(report.entries.len(), 3);
    assert!(report.entries.iter().all(|e| e.day() != 2));
    assert!(matches!(
        report.outcomes[1],
        (2, DayOutcome::Exhausted { attempts: 5 })
    ));
    assert_eq!(fetcher.calls(2), 5);
    assert_eq!(report.average().unwrap(), 100.0);
}

#[tokio::test]
async fn attempts_never_exceed_ceiling() {
    let fetcher = Arc::new(ScriptedFetcher::new(today(), Step::RateLimited));

    let report = fast_pool(
        BatchConfig::default()
            .with_total_days(6)
            .with_max_attempts(3),
    )
    .run(fetcher.clone(), ResultCollector::new())
    .await
    .unwrap();

    assert!(report.entries.is_empty());
    assert!(report.average().is_err());
    for day in 1..=6 {
        assert_eq!(fetcher.calls(day), 3);
    }
    assert_eq!(report.count("exhausted"), 6);
}

#[tokio::test]
async fn hard_failure_is_contained_to_its_day() {
    let fetcher = Arc::new(
        ScriptedFetcher::new(today(), Step::Rate(5.0)).script(3, vec![Step::Fail]),
    );

    let report = fast_pool(BatchConfig::default().with_total_days(5))
        .run(fetcher.clone(), ResultCollector::new())
        .await
        .unwrap();

    assert_eq!(report.entries.len(), 4);
    assert_eq!(report.count("failed"), 1);
    assert_eq!(fetcher.calls(3), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_days_on_multi_thread_runtime() {
    let fetcher = ScriptedFetcher::new(today(), Step::Rate(7.0))
        .script(10, vec![Step::RateLimited, Step::Rate(7.0)])
        .script(20, vec![Step::RateLimited, Step::RateLimited, Step::Rate(7.0)]);

    let report = fast_pool(
        BatchConfig::default()
            .with_total_days(50)
            .with_concurrency(4),
    )
    .run(Arc::new(fetcher), ResultCollector::new())
    .await
    .unwrap();

    assert_eq!(report.entries.len(), 50);
    let mut days: Vec<u32> = report.entries.iter().map(|e| e.day()).collect();
    days.sort_unstable();
    days.dedup();
    assert_eq!(days.len(), 50);
    assert_eq!(report.total_attempts(), 53);
}
