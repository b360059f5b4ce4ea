//! Feed stats — counts and averages over a snapshot.
//!
//! Backs the dashboard's summary cards: total, in-flight, finalized and
//! failed counts plus success rate, mean latencies and mean fee.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{Transaction, TxStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedStats {
    pub total: usize,
    /// Pending or preconfirmed.
    pub pending: usize,
    pub finalized: usize,
    pub failed: usize,
    /// Finalized share of resolved transactions, as a percentage.
    pub success_rate: f64,
    pub avg_preconfirm_latency_ms: Option<f64>,
    pub avg_finalize_latency_ms: Option<f64>,
    pub avg_fee: Option<Decimal>,
}

impl FeedStats {
    pub fn from_transactions<'a, I>(txs: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut stats = FeedStats::default();
        let mut preconfirm = Mean::default();
        let mut finalize = Mean::default();
        let mut fee_sum = Decimal::ZERO;

        for tx in txs {
            stats.total += 1;
            fee_sum += tx.fee;
            match tx.status {
                TxStatus::Pending | TxStatus::Preconfirmed => stats.pending += 1,
                TxStatus::Finalized => stats.finalized += 1,
                TxStatus::Failed => stats.failed += 1,
            }
            if let Some(ms) = tx.preconfirm_latency_ms {
                preconfirm.add(ms);
            }
            if let Some(ms) = tx.finalize_latency_ms {
                finalize.add(ms);
            }
        }

        let resolved = stats.finalized + stats.failed;
        stats.success_rate = if resolved == 0 {
            0.0
        } else {
            stats.finalized as f64 / resolved as f64 * 100.0
        };
        stats.avg_preconfirm_latency_ms = preconfirm.value();
        stats.avg_finalize_latency_ms = finalize.value();
        stats.avg_fee = (stats.total > 0).then(|| fee_sum / Decimal::from(stats.total));
        stats
    }
}

#[derive(Default)]
struct Mean {
    sum: u64,
    count: u64,
}

impl Mean {
    fn add(&mut self, value: u32) {
        self.sum += u64::from(value);
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
