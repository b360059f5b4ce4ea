//! Stage-transition timeline.
//!
//! A min-heap of one-shot events keyed by virtual fire time (milliseconds
//! since the engine origin), plus a cancellation table keyed by transaction
//! id. Cancelled events stay in the heap but are skipped when they surface.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::types::TxId;

/// Which transition a scheduled event drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// `Pending → Preconfirmed | Failed`.
    Preconfirm,
    /// `Preconfirmed → Finalized`.
    Finalize,
}

/// An event whose fire time has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Due {
    pub at_ms: u64,
    pub tx_id: TxId,
    pub stage: Stage,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    at_ms: u64,
    /// Insertion order; breaks ties between equal fire times.
    seq: u64,
    tx_id: TxId,
    stage: Stage,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at_ms, self.seq).cmp(&(other.at_ms, other.seq))
    }
}

#[derive(Debug, Default)]
pub struct Timeline {
    queue: BinaryHeap<Reverse<Entry>>,
    /// Live event seqs per transaction.
    by_tx: HashMap<TxId, Vec<u64>>,
    live: HashSet<u64>,
    next_seq: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot event.
    pub fn schedule(&mut self, at_ms: u64, tx_id: TxId, stage: Stage) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry {
            at_ms,
            seq,
            tx_id,
            stage,
        }));
        self.by_tx.entry(tx_id).or_default().push(seq);
        self.live.insert(seq);
    }

    /// Cancel every outstanding event for `tx_id`. Returns how many were live.
    pub fn cancel(&mut self, tx_id: &TxId) -> usize {
        let Some(seqs) = self.by_tx.remove(tx_id) else {
            return 0;
        };
        seqs.iter().filter(|seq| self.live.remove(*seq)).count()
    }

    /// Whether any live event still targets `tx_id`.
    pub fn has_pending(&self, tx_id: &TxId) -> bool {
        self.by_tx.contains_key(tx_id)
    }

    /// Fire time of the earliest live event.
    pub fn next_due_at(&mut self) -> Option<u64> {
        self.discard_stale();
        self.queue.peek().map(|Reverse(entry)| entry.at_ms)
    }

    /// Pop the earliest live event if it fires at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Due> {
        self.discard_stale();
        let Reverse(head) = self.queue.peek()?;
        if head.at_ms > now_ms {
            return None;
        }
        let Reverse(entry) = self.queue.pop()?;
        self.retire(&entry);
        Some(Due {
            at_ms: entry.at_ms,
            tx_id: entry.tx_id,
            stage: entry.stage,
        })
    }

    /// Drop every event, live or cancelled.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.by_tx.clear();
        self.live.clear();
    }

    /// Number of live events.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(head)) = self.queue.peek() {
            if self.live.contains(&head.seq) {
                break;
            }
            self.queue.pop();
        }
    }

    fn retire(&mut self, entry: &Entry) {
        self.live.remove(&entry.seq);
        if let Some(seqs) = self.by_tx.get_mut(&entry.tx_id) {
            seqs.retain(|seq| *seq != entry.seq);
            if seqs.is_empty() {
                self.by_tx.remove(&entry.tx_id);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
