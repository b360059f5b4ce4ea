//! Feed core lifecycle on a hand-stepped clock.

use chrono::{Duration, Utc};
use std::collections::HashMap;

use preconf_feed::config::FeedConfig;
use preconf_feed::engine::{FeedCore, FeedEvent, RandomSampler};
use preconf_feed::types::{FeedFilter, Transaction, TxId, TxStatus};

use crate::scripted_sampler::ScriptedSampler;

fn is_subsequence(part: &[Transaction], whole: &[Transaction]) -> bool {
    let mut rest = whole.iter();
    part.iter().all(|tx| rest.any(|other| other.id == tx.id))
}

#[test]
fn test_seeded_run_respects_transition_graph() {
    let cfg = FeedConfig {
        seed: Some(17),
        ..FeedConfig::default()
    };
    let mut core = FeedCore::new(cfg.capacity, Box::new(RandomSampler::new(&cfg)), Utc::now());
    assert!(core.start(0));

    let mut last_seen: HashMap<TxId, TxStatus> = HashMap::new();
    let mut evictions = 0;
    let mut failures = 0;

    while let Some(at) = core.next_wakeup() {
        if at > 600_000 {
            break;
        }
        for event in core.advance_to(at) {
            match event {
                FeedEvent::Submitted { evicted: Some(old), .. } => {
                    evictions += 1;
                    assert!(core.get(&old).is_none());
                    assert!(!core.has_pending_events(&old));
                }
                FeedEvent::Preconfirmed { latency_ms, .. } => {
                    assert!(cfg.preconfirm_latency_ms.contains(&latency_ms))
                }
                FeedEvent::Finalized { latency_ms, .. } => {
                    assert!(cfg.finalize_latency_ms.contains(&latency_ms))
                }
                FeedEvent::Failed { id } => {
                    failures += 1;
                    assert!(!core.has_pending_events(&id));
                }
                FeedEvent::Submitted { .. } => {}
            }
        }

        assert!(core.len() <= cfg.capacity);
        for tx in core.transactions() {
            assert!(tx.is_consistent(), "inconsistent: {tx}");
            if let Some(prev) = last_seen.insert(tx.id, tx.status) {
                assert!(
                    prev == tx.status || prev.can_transition_to(tx.status),
                    "{prev} -> {} for {}",
                    tx.status,
                    tx.id
                );
            }
        }
    }

    // ~240 submissions over ten minutes
    assert!(evictions > 100, "evictions {evictions}");
    assert!(failures > 0);
    assert_eq!(core.len(), cfg.capacity);

    let all = core.snapshot(FeedFilter::All);
    let mut partitioned = 0;
    for filter in [FeedFilter::Pending, FeedFilter::Success, FeedFilter::Failed] {
        let part = core.snapshot(filter);
        assert!(is_subsequence(&part, &all), "{filter} reorders the feed");
        assert!(part.iter().all(|tx| filter.matches(tx)));
        partitioned += part.len();
    }
    assert_eq!(partitioned, all.len());
}

#[test]
fn test_failed_transaction_never_finalizes() {
    let sampler = ScriptedSampler::new().with_outcomes([false]);
    let mut core = FeedCore::new(50, sampler.boxed(), Utc::now());
    let id = core.submit(0).tx_id();

    let events = core.advance_to(10_000);
    assert_eq!(events, vec![FeedEvent::Failed { id }]);

    let tx = core.get(&id).unwrap();
    assert_eq!(tx.status, TxStatus::Failed);
    assert!(tx.preconfirm_latency_ms.is_none());
    assert!(tx.finalize_latency_ms.is_none());
    assert_eq!(core.pending_events(), 0);
}

#[test]
fn test_evicted_events_are_harmless() {
    let sampler = ScriptedSampler::new().with_interval(100);
    let mut core = FeedCore::new(3, sampler.boxed(), Utc::now());
    core.start(0);

    let submitted: Vec<TxId> = core
        .advance_to(650)
        .into_iter()
        .filter_map(|event| match event {
            FeedEvent::Submitted { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(submitted.len(), 6);

    let kept: Vec<TxId> = core.transactions().map(|tx| tx.id).collect();
    let newest: Vec<TxId> = submitted.iter().rev().take(3).copied().collect();
    assert_eq!(kept, newest);
    for old in &submitted[..3] {
        assert!(!core.has_pending_events(old));
    }

    core.pause();
    let events = core.advance_to(10_000);
    assert!(events.iter().all(|event| kept.contains(&event.tx_id())));
    assert!(core
        .transactions()
        .all(|tx| tx.status == TxStatus::Finalized));
    assert_eq!(core.pending_events(), 0);
    assert_eq!(core.next_wakeup(), None);
}

#[test]
fn test_resume_draws_fresh_interval() {
    let origin = Utc::now();
    let mut core = FeedCore::new(50, ScriptedSampler::new().boxed(), origin);
    core.start(0);
    assert_eq!(core.advance_to(2_000).len(), 1);

    core.pause();
    let events = core.advance_to(10_000);
    assert!(events
        .iter()
        .all(|event| !matches!(event, FeedEvent::Submitted { .. })));
    assert_eq!(core.len(), 1);

    core.resume(10_000);
    assert_eq!(core.next_submission_at(), Some(12_000));
    assert!(core.advance_to(11_999).is_empty());

    let id = core.advance_to(12_000)[0].tx_id();
    let tx = core.get(&id).unwrap();
    assert_eq!(tx.created_at, origin + Duration::milliseconds(12_000));
}

#[test]
fn test_stop_releases_feed() {
    let mut core = FeedCore::new(50, ScriptedSampler::new().boxed(), Utc::now());
    core.start(0);
    core.advance_to(9_000);
    assert!(!core.is_empty());

    assert!(core.stop());
    assert!(!core.stop());
    assert!(core.is_empty());
    assert_eq!(core.pending_events(), 0);
    assert_eq!(core.next_wakeup(), None);
    assert!(core.advance_to(100_000).is_empty());
}
