//! Shared types for the preconfirmation feed.
//!
//! These types form the data model used across the engine, the what-if
//! simulator and the dashboard. Transactions are only ever mutated by the
//! engine; everything else sees cloned snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque transaction identifier.
pub type TxId = Uuid;

// ---------------------------------------------------------------------------
// Transaction status
// ---------------------------------------------------------------------------

/// Lifecycle stage of a simulated transaction.
///
/// Legal edges: `Pending → Preconfirmed`, `Pending → Failed`,
/// `Preconfirmed → Finalized`. `Failed` and `Finalized` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Preconfirmed,
    Finalized,
    Failed,
}

impl TxStatus {
    pub const ALL: &'static [TxStatus] = &[
        TxStatus::Pending,
        TxStatus::Preconfirmed,
        TxStatus::Finalized,
        TxStatus::Failed,
    ];

    /// Whether no further transition can leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Finalized | TxStatus::Failed)
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Preconfirmed)
                | (TxStatus::Pending, TxStatus::Failed)
                | (TxStatus::Preconfirmed, TxStatus::Finalized)
        )
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "PENDING"),
            TxStatus::Preconfirmed => write!(f, "PRECONFIRMED"),
            TxStatus::Finalized => write!(f, "FINALIZED"),
            TxStatus::Failed => write!(f, "FAILED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Fees are exact to the lamport.
pub const FEE_DECIMALS: u32 = 9;
const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Nearest whole lamport count for a SOL amount.
pub fn sol_to_lamports(sol: f64) -> i64 {
    (sol * LAMPORTS_PER_SOL).round() as i64
}

pub fn lamports_to_sol(lamports: i64) -> Decimal {
    Decimal::new(lamports, FEE_DECIMALS)
}

/// SOL amount from config, rounded to the lamport.
pub fn sol_to_decimal(sol: f64) -> Decimal {
    lamports_to_sol(sol_to_lamports(sol))
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A simulated transaction tracked by the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    /// Display-only signature string.
    pub signature: String,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
    /// Simulated preconfirmation latency, set on entering `Preconfirmed`.
    pub preconfirm_latency_ms: Option<u32>,
    /// Simulated finalization latency, set on entering `Finalized`.
    pub finalize_latency_ms: Option<u32>,
    /// Fee in SOL
    pub fee: Decimal,
    pub size_bytes: u32,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}B fee={:.6} SOL",
            self.status, self.signature, self.size_bytes, self.fee,
        )?;
        if let Some(ms) = self.preconfirm_latency_ms {
            write!(f, " preconfirm={ms}ms")?;
        }
        if let Some(ms) = self.finalize_latency_ms {
            write!(f, " finalize={ms}ms")?;
        }
        Ok(())
    }
}

impl Transaction {
    /// A freshly submitted transaction in `Pending`.
    pub fn new(
        id: TxId,
        signature: String,
        created_at: DateTime<Utc>,
        fee: Decimal,
        size_bytes: u32,
    ) -> Self {
        Self {
            id,
            signature,
            status: TxStatus::Pending,
            created_at,
            preconfirm_latency_ms: None,
            finalize_latency_ms: None,
            fee,
            size_bytes,
        }
    }

    /// Still waiting on a transition (pending or preconfirmed).
    pub fn is_in_flight(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Check that the latency fields agree with the status.
    pub fn is_consistent(&self) -> bool {
        let preconfirm_expected =
            matches!(self.status, TxStatus::Preconfirmed | TxStatus::Finalized);
        let finalize_expected = self.status == TxStatus::Finalized;
        self.preconfirm_latency_ms.is_some() == preconfirm_expected
            && self.finalize_latency_ms.is_some() == finalize_expected
    }

    pub(crate) fn preconfirm(&mut self, latency_ms: u32) {
        self.advance(TxStatus::Preconfirmed);
        self.preconfirm_latency_ms = Some(latency_ms);
    }

    pub(crate) fn fail(&mut self) {
        self.advance(TxStatus::Failed);
    }

    pub(crate) fn finalize(&mut self, latency_ms: u32) {
        self.advance(TxStatus::Finalized);
        self.finalize_latency_ms = Some(latency_ms);
    }

    fn advance(&mut self, next: TxStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal transition {} -> {} for {}",
            self.status,
            next,
            self.id,
        );
        self.status = next;
    }

    /// Helper to build a test transaction with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        Transaction::new(
            Uuid::new_v4(),
            "5h2kq9x0a1bzc...k3p1".to_string(),
            Utc::now(),
            rust_decimal_macros::dec!(0.0005),
            320,
        )
    }
}

// ---------------------------------------------------------------------------
// Feed filter
// ---------------------------------------------------------------------------

/// Read-only projection applied to a feed snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFilter {
    #[default]
    All,
    /// Pending or preconfirmed.
    Pending,
    /// Finalized.
    Success,
    Failed,
}

impl FeedFilter {
    pub const ALL: &'static [FeedFilter] = &[
        FeedFilter::All,
        FeedFilter::Pending,
        FeedFilter::Success,
        FeedFilter::Failed,
    ];

    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            FeedFilter::All => true,
            FeedFilter::Pending => tx.is_in_flight(),
            FeedFilter::Success => tx.status == TxStatus::Finalized,
            FeedFilter::Failed => tx.status == TxStatus::Failed,
        }
    }

    /// Order-preserving projection over `txs`.
    pub fn apply<'a, I>(&self, txs: I) -> Vec<Transaction>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        txs.into_iter().filter(|tx| self.matches(tx)).cloned().collect()
    }
}

impl fmt::Display for FeedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedFilter::All => write!(f, "all"),
            FeedFilter::Pending => write!(f, "pending"),
            FeedFilter::Success => write!(f, "success"),
            FeedFilter::Failed => write!(f, "failed"),
        }
    }
}

/// Parse a filter name (case-insensitive).
impl std::str::FromStr for FeedFilter {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(FeedFilter::All),
            "pending" | "in-flight" => Ok(FeedFilter::Pending),
            "success" | "finalized" => Ok(FeedFilter::Success),
            "failed" | "failure" => Ok(FeedFilter::Failed),
            _ => Err(FeedError::InvalidFilter(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown feed filter: {0:?} (expected all, pending, success or failed)")]
    InvalidFilter(String),

    #[error("Invalid simulation parameters: {0}")]
    InvalidParams(String),

    #[error("Feed engine must be started from within a tokio runtime")]
    NoRuntime,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
