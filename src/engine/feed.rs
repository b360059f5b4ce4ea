//! Feed core — the deterministic half of the live feed engine.
//!
//! Owns the bounded, newest-first transaction list, the stage-transition
//! timeline and the submission cadence. Time is virtual: every operation
//! takes "milliseconds since origin", so the same code runs under the tokio
//! driver and under a hand-stepped clock in tests.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::{debug, trace};
use uuid::Uuid;

use super::sampler::Sampler;
use super::schedule::{Due, Stage, Timeline};
use crate::types::{FeedFilter, Transaction, TxId, TxStatus};

/// A state change applied to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    Submitted { id: TxId, evicted: Option<TxId> },
    Preconfirmed { id: TxId, latency_ms: u32 },
    Failed { id: TxId },
    Finalized { id: TxId, latency_ms: u32 },
}

impl FeedEvent {
    pub fn tx_id(&self) -> TxId {
        match self {
            FeedEvent::Submitted { id, .. }
            | FeedEvent::Preconfirmed { id, .. }
            | FeedEvent::Failed { id }
            | FeedEvent::Finalized { id, .. } => *id,
        }
    }
}

pub struct FeedCore {
    capacity: usize,
    /// Newest first.
    entries: VecDeque<Transaction>,
    timeline: Timeline,
    sampler: Box<dyn Sampler>,
    /// Wall-clock time of virtual millisecond zero.
    origin: DateTime<Utc>,
    running: bool,
    paused: bool,
    next_submit_at: Option<u64>,
    /// Bumped on every observable change.
    revision: u64,
}

impl FeedCore {
    pub fn new(capacity: usize, sampler: Box<dyn Sampler>, origin: DateTime<Utc>) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1) + 1),
            timeline: Timeline::new(),
            sampler,
            origin,
            running: false,
            paused: false,
            next_submit_at: None,
            revision: 0,
        }
    }

    // -- Lifecycle --------------------------------------------------------

    /// Begin the submission cadence. Returns `false` if already running.
    pub fn start(&mut self, now_ms: u64) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        if !self.paused {
            self.schedule_next_submission(now_ms);
        }
        self.revision += 1;
        true
    }

    /// Stop future submissions. In-flight transitions keep firing.
    pub fn pause(&mut self) -> bool {
        if self.paused {
            return false;
        }
        self.paused = true;
        self.next_submit_at = None;
        self.revision += 1;
        true
    }

    /// Restart the cadence with a fresh interval from `now_ms`.
    pub fn resume(&mut self, now_ms: u64) -> bool {
        if !self.paused {
            return false;
        }
        self.paused = false;
        if self.running {
            self.schedule_next_submission(now_ms);
        }
        self.revision += 1;
        true
    }

    /// Cancel every scheduled event and release the feed. Safe to repeat.
    pub fn stop(&mut self) -> bool {
        let was_active = self.running || !self.entries.is_empty() || !self.timeline.is_empty();
        self.running = false;
        self.next_submit_at = None;
        self.timeline.clear();
        self.entries.clear();
        if was_active {
            self.revision += 1;
        }
        was_active
    }

    // -- Driving ----------------------------------------------------------

    /// Earliest virtual time at which [`step`](Self::step) has work.
    pub fn next_wakeup(&mut self) -> Option<u64> {
        match (self.timeline.next_due_at(), self.next_submit_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Apply the earliest change due at or before `now_ms`.
    ///
    /// Stale events are skipped. Returns `None` once nothing else is due.
    /// On equal fire times, stage transitions run before a submission.
    pub fn step(&mut self, now_ms: u64) -> Option<FeedEvent> {
        loop {
            let transition_at = self.timeline.next_due_at().filter(|at| *at <= now_ms);
            let submit_at = self.next_submit_at.filter(|at| *at <= now_ms);

            match (transition_at, submit_at) {
                (Some(t), Some(s)) if s < t => return Some(self.submit_scheduled(s)),
                (Some(_), _) => {
                    let due = self.timeline.pop_due(now_ms)?;
                    if let Some(event) = self.apply(due) {
                        return Some(event);
                    }
                }
                (None, Some(s)) => return Some(self.submit_scheduled(s)),
                (None, None) => return None,
            }
        }
    }

    /// Apply everything due up to `now_ms`.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<FeedEvent> {
        std::iter::from_fn(|| self.step(now_ms)).collect()
    }

    /// Insert a new pending transaction created at `at_ms`.
    ///
    /// Schedules its preconfirm and finalize events, both measured from
    /// creation, and evicts the oldest entry when over capacity.
    pub fn submit(&mut self, at_ms: u64) -> FeedEvent {
        let id = Uuid::new_v4();
        let created_at = self.origin + Duration::milliseconds(at_ms as i64);
        let tx = Transaction::new(
            id,
            self.sampler.signature(),
            created_at,
            self.sampler.fee(),
            self.sampler.size_bytes(),
        );

        let preconfirm_at = at_ms + self.sampler.preconfirm_delay_ms();
        let finalize_at = at_ms + self.sampler.finalize_delay_ms();
        self.timeline.schedule(preconfirm_at, id, Stage::Preconfirm);
        self.timeline.schedule(finalize_at, id, Stage::Finalize);

        debug!(
            tx_id = %id,
            at_ms,
            preconfirm_at,
            finalize_at,
            fee = %tx.fee,
            size_bytes = tx.size_bytes,
            "Transaction submitted"
        );

        self.entries.push_front(tx);
        let evicted = self.evict_overflow();
        self.revision += 1;

        FeedEvent::Submitted { id, evicted }
    }

    /// Apply a fired event. A no-op when the target was evicted or is no
    /// longer in the stage's expected pre-state.
    pub(crate) fn apply(&mut self, due: Due) -> Option<FeedEvent> {
        let Some(tx) = self.entries.iter_mut().find(|tx| tx.id == due.tx_id) else {
            trace!(tx_id = %due.tx_id, stage = ?due.stage, "Event for evicted transaction ignored");
            return None;
        };

        let event = match (due.stage, tx.status) {
            (Stage::Preconfirm, TxStatus::Pending) => {
                if self.sampler.lands() {
                    let latency_ms = self.sampler.preconfirm_latency_ms();
                    tx.preconfirm(latency_ms);
                    FeedEvent::Preconfirmed { id: tx.id, latency_ms }
                } else {
                    tx.fail();
                    self.timeline.cancel(&due.tx_id);
                    FeedEvent::Failed { id: tx.id }
                }
            }
            (Stage::Finalize, TxStatus::Preconfirmed) => {
                let latency_ms = self.sampler.finalize_latency_ms();
                tx.finalize(latency_ms);
                FeedEvent::Finalized { id: tx.id, latency_ms }
            }
            (stage, status) => {
                trace!(tx_id = %due.tx_id, ?stage, %status, "Event no longer applicable");
                return None;
            }
        };

        debug!(tx_id = %due.tx_id, at_ms = due.at_ms, ?event, "Transaction advanced");
        self.revision += 1;
        Some(event)
    }

    fn submit_scheduled(&mut self, at_ms: u64) -> FeedEvent {
        let event = self.submit(at_ms);
        self.schedule_next_submission(at_ms);
        event
    }

    fn schedule_next_submission(&mut self, from_ms: u64) {
        self.next_submit_at = Some(from_ms + self.sampler.submit_interval_ms());
    }

    fn evict_overflow(&mut self) -> Option<TxId> {
        let mut evicted = None;
        while self.entries.len() > self.capacity {
            if let Some(old) = self.entries.pop_back() {
                let cancelled = self.timeline.cancel(&old.id);
                debug!(tx_id = %old.id, status = %old.status, cancelled, "Transaction evicted");
                evicted = Some(old.id);
            }
        }
        evicted
    }

    // -- Reading ----------------------------------------------------------

    /// Filtered, newest-first copy of the feed.
    pub fn snapshot(&self, filter: FeedFilter) -> Vec<Transaction> {
        filter.apply(&self.entries)
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    pub fn get(&self, id: &TxId) -> Option<&Transaction> {
        self.entries.iter().find(|tx| tx.id == *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live scheduled stage transitions.
    pub fn pending_events(&self) -> usize {
        self.timeline.len()
    }

    pub fn has_pending_events(&self, id: &TxId) -> bool {
        self.timeline.has_pending(id)
    }

    pub fn next_submission_at(&self) -> Option<u64> {
        self.next_submit_at
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
