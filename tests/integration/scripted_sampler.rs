//! Scripted sampler for integration testing.
//!
//! Returns fixed delays and latencies and plays back a queue of landing
//! outcomes, so every branch and fire time is known up front.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;

use preconf_feed::engine::Sampler;

#[derive(Debug, Clone)]
pub struct ScriptedSampler {
    pub interval_ms: u64,
    pub preconfirm_delay_ms: u64,
    pub finalize_delay_ms: u64,
    pub preconfirm_latency_ms: u32,
    pub finalize_latency_ms: u32,
    pub fee: Decimal,
    pub size_bytes: u32,
    /// Played back in order; lands once exhausted.
    outcomes: VecDeque<bool>,
    signatures: u64,
}

impl Default for ScriptedSampler {
    /// Every draw at the lower bound of its default range.
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            preconfirm_delay_ms: 500,
            finalize_delay_ms: 2_000,
            preconfirm_latency_ms: 20,
            finalize_latency_ms: 400,
            fee: dec!(0.0003),
            size_bytes: 200,
            outcomes: VecDeque::new(),
            signatures: 0,
        }
    }
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue landing outcomes for the next preconfirm events.
    pub fn with_outcomes(mut self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.outcomes.extend(outcomes);
        self
    }

    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn boxed(self) -> Box<dyn Sampler> {
        Box::new(self)
    }
}

impl Sampler for ScriptedSampler {
    fn submit_interval_ms(&mut self) -> u64 {
        self.interval_ms
    }

    fn preconfirm_delay_ms(&mut self) -> u64 {
        self.preconfirm_delay_ms
    }

    fn finalize_delay_ms(&mut self) -> u64 {
        self.finalize_delay_ms
    }

    fn lands(&mut self) -> bool {
        self.outcomes.pop_front().unwrap_or(true)
    }

    fn preconfirm_latency_ms(&mut self) -> u32 {
        self.preconfirm_latency_ms
    }

    fn finalize_latency_ms(&mut self) -> u32 {
        self.finalize_latency_ms
    }

    fn fee(&mut self) -> Decimal {
        self.fee
    }

    fn size_bytes(&mut self) -> u32 {
        self.size_bytes
    }

    fn signature(&mut self) -> String {
        self.signatures += 1;
        format!("{:013}...test", self.signatures)
    }
}
