//! Live engine on tokio's paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use preconf_feed::engine::LiveFeedEngine;
use preconf_feed::types::{FeedFilter, TxStatus};

use crate::scripted_sampler::ScriptedSampler;

fn scripted_engine(capacity: usize, sampler: ScriptedSampler) -> LiveFeedEngine {
    LiveFeedEngine::with_sampler(capacity, sampler.boxed())
}

#[tokio::test(start_paused = true)]
async fn test_minimum_delays_on_tokio_clock() {
    let engine = scripted_engine(50, ScriptedSampler::new());
    engine.start().unwrap();

    sleep(Duration::from_millis(1_999)).await;
    assert!(engine.snapshot(FeedFilter::All).is_empty());

    // Submitted at 2000 ms: preconfirm due at 2500, finalize at 4000.
    sleep(Duration::from_millis(500)).await;
    let feed = engine.snapshot(FeedFilter::All);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].status, TxStatus::Pending);
    let id = feed[0].id;

    sleep(Duration::from_millis(2)).await;
    let tx = engine.latest().transactions.iter().find(|tx| tx.id == id).cloned().unwrap();
    assert_eq!(tx.status, TxStatus::Preconfirmed);
    assert_eq!(tx.preconfirm_latency_ms, Some(20));

    sleep(Duration::from_millis(1_498)).await;
    let tx = engine.latest().transactions.iter().find(|tx| tx.id == id).cloned().unwrap();
    assert_eq!(tx.status, TxStatus::Preconfirmed);

    sleep(Duration::from_millis(2)).await;
    let tx = engine.latest().transactions.iter().find(|tx| tx.id == id).cloned().unwrap();
    assert_eq!(tx.status, TxStatus::Finalized);
    assert_eq!(tx.finalize_latency_ms, Some(400));
    engine.stop();
}

#[tokio::test(start_paused = true)]
async fn test_failed_branch_on_tokio_clock() {
    let engine = scripted_engine(50, ScriptedSampler::new().with_outcomes([false]));
    engine.start().unwrap();

    sleep(Duration::from_millis(2_501)).await;
    let failed = engine.snapshot(FeedFilter::Failed);
    assert_eq!(failed.len(), 1);

    sleep(Duration::from_millis(5_000)).await;
    let tx = engine
        .latest()
        .transactions
        .iter()
        .find(|tx| tx.id == failed[0].id)
        .cloned()
        .unwrap();
    assert_eq!(tx.status, TxStatus::Failed);
    assert!(tx.finalize_latency_ms.is_none());
    engine.stop();
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_sees_each_stage() {
    let engine = scripted_engine(50, ScriptedSampler::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = engine.subscribe(move |snap| {
        // Oldest transaction is the first one submitted.
        if let Some(first) = snap.transactions.last() {
            let mut seen = sink.lock().unwrap();
            if seen.last() != Some(&first.status) {
                seen.push(first.status);
            }
        }
    });

    engine.start().unwrap();
    sleep(Duration::from_millis(4_500)).await;
    engine.pause();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![TxStatus::Pending, TxStatus::Preconfirmed, TxStatus::Finalized]
    );
    engine.stop();
}

#[tokio::test(start_paused = true)]
async fn test_capacity_holds_in_every_snapshot() {
    let engine = scripted_engine(2, ScriptedSampler::new().with_interval(100));
    let max_len = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&max_len);
    let _sub = engine.subscribe(move |snap| {
        let mut max = sink.lock().unwrap();
        *max = (*max).max(snap.transactions.len());
    });

    engine.start().unwrap();
    sleep(Duration::from_secs(3)).await;

    assert_eq!(*max_len.lock().unwrap(), 2);
    assert_eq!(engine.snapshot(FeedFilter::All).len(), 2);
    engine.stop();
}

#[tokio::test(start_paused = true)]
async fn test_clones_drive_the_same_feed() {
    let engine = scripted_engine(50, ScriptedSampler::new());
    let handle = engine.clone();
    engine.start().unwrap();

    handle.pause();
    assert!(engine.is_paused());
    sleep(Duration::from_secs(10)).await;
    assert!(engine.snapshot(FeedFilter::All).is_empty());

    handle.resume();
    sleep(Duration::from_millis(2_001)).await;
    assert_eq!(engine.snapshot(FeedFilter::All).len(), 1);

    handle.stop();
    assert!(!engine.is_running());
}
