// Unit tests for the credential sink and the harvest-complete signal

use super::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

fn artifact(body: &str) -> HarvestedArtifact {
    HarvestedArtifact {
        url: "https://console.example.com/api/batchGraphql".to_string(),
        method: "POST".to_string(),
        headers: HashMap::new(),
        body: body.to_string(),
        captured_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_memory_sink_stores_latest() {
    let sink = MemorySink::new();
    assert!(sink.latest().await.is_none());

    sink.update(artifact("one")).await;
    assert_eq!(sink.latest().await.unwrap().body, "one");

    sink.update(artifact("two")).await;
    assert_eq!(sink.latest().await.unwrap().body, "two");
}

#[tokio::test]
async fn test_signal_set_before_wait_returns_immediately() {
    let signal = HarvestSignal::new();
    signal.set();
    assert!(signal.wait(Duration::from_millis(1)).await);
}

#[tokio::test(start_paused = true)]
async fn test_signal_wait_times_out_when_never_set() {
    let signal = HarvestSignal::new();
    assert!(!signal.wait(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_signal_wakes_concurrent_waiter() {
    let signal = Arc::new(HarvestSignal::new());

    let waiter = {
        let signal = Arc::clone(&signal);
        tokio::spawn(async move { signal.wait(Duration::from_secs(5)).await })
    };

    tokio::task::yield_now().await;
    signal.set();

    assert!(waiter.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_signal_clear_rearms() {
    let signal = HarvestSignal::new();

    signal.set();
    assert!(signal.is_set());
    assert!(signal.wait(Duration::from_millis(1)).await);

    // Consumer re-arms before waiting for the next harvest
    signal.clear();
    assert!(!signal.is_set());
    assert!(!signal.wait(Duration::from_secs(1)).await);

    // And the next harvest fires it again
    signal.set();
    assert!(signal.wait(Duration::from_millis(1)).await);
}
