//! Concurrent appends to the result collector

use btc_rate_average::downloader::ResultCollector;
use btc_rate_average::{Currency, Entry};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_from_tasks() {
    let collector = ResultCollector::new();
    let mut handles = Vec::new();

    for day in 1..=200u32 {
        let collector = collector.clone();
        handles.push(tokio::spawn(async move {
            collector.append(Entry::new(day, f64::from(day), Currency::Usd))
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(collector.len(), 200);
    assert_eq!(collector.rates().iter().sum::<f64>(), 20_100.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_duplicates_admit_one() {
    let collector = ResultCollector::new();
    let mut handles = Vec::new();

    for n in 0..16 {
        let collector = collector.clone();
        handles.push(tokio::spawn(async move {
            collector.append(Entry::new(5, f64::from(n), Currency::Eur))
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(collector.len(), 1);
    assert!(collector.contains_day(5));
}
