//! What-if simulator — one-shot outcome of a single hypothetical transaction.
//!
//! Uses the feed's latency ranges, a fee that scales with priority and a
//! predictability score. Independent of the live engine.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{FeedConfig, SimulatorConfig, Span};
use crate::types::{sol_to_decimal, FeedError};

pub const MIN_SIZE_BYTES: u32 = 100;
pub const MAX_SIZE_BYTES: u32 = 1_000;
pub const MAX_PRIORITY: u8 = 100;

// ---------------------------------------------------------------------------
// Parameters & result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub size_bytes: u32,
    /// 0 (lowest) to 100 (highest).
    pub priority: u8,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            size_bytes: 250,
            priority: 50,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), FeedError> {
        if !(MIN_SIZE_BYTES..=MAX_SIZE_BYTES).contains(&self.size_bytes) {
            return Err(FeedError::InvalidParams(format!(
                "size_bytes must be within {MIN_SIZE_BYTES}..={MAX_SIZE_BYTES}, got {}",
                self.size_bytes
            )));
        }
        if self.priority > MAX_PRIORITY {
            return Err(FeedError::InvalidParams(format!(
                "priority must be within 0..={MAX_PRIORITY}, got {}",
                self.priority
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
}

impl PriorityLevel {
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            71.. => PriorityLevel::High,
            41..=70 => PriorityLevel::Medium,
            _ => PriorityLevel::Low,
        }
    }
}

impl std::fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityLevel::Low => write!(f, "Low"),
            PriorityLevel::Medium => write!(f, "Medium"),
            PriorityLevel::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub success: bool,
    pub preconfirm_latency_ms: u32,
    pub finalize_latency_ms: u32,
    /// SOL.
    pub fee: Decimal,
    /// Percent.
    pub predictability: f64,
    pub priority_level: PriorityLevel,
    pub size_bytes: u32,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WhatIfSimulator {
    base_fee: Decimal,
    priority_fee_span: Decimal,
    success_probability: f64,
    predictability_pct: Span<f64>,
    preconfirm_latency_ms: Span<u32>,
    finalize_latency_ms: Span<u32>,
}

impl WhatIfSimulator {
    /// Latency ranges come from the feed so both views agree.
    pub fn new(config: &SimulatorConfig, feed: &FeedConfig) -> Self {
        Self {
            base_fee: sol_to_decimal(config.base_fee_sol),
            priority_fee_span: sol_to_decimal(config.priority_fee_span_sol),
            success_probability: config.success_probability,
            predictability_pct: config.predictability_pct,
            preconfirm_latency_ms: feed.preconfirm_latency_ms,
            finalize_latency_ms: feed.finalize_latency_ms,
        }
    }

    /// Fee for a priority: base plus the priority's share of the span.
    pub fn fee_for(&self, priority: u8) -> Decimal {
        let share = Decimal::from(priority.min(MAX_PRIORITY)) / Decimal::from(MAX_PRIORITY);
        (self.base_fee + self.priority_fee_span * share).normalize()
    }

    pub fn simulate<R>(&self, params: &SimulationParams, rng: &mut R) -> Result<SimulationResult, FeedError>
    where
        R: Rng + ?Sized,
    {
        params.validate()?;

        let result = SimulationResult {
            success: rng.gen_bool(self.success_probability),
            preconfirm_latency_ms: rng
                .gen_range(self.preconfirm_latency_ms.min..self.preconfirm_latency_ms.max),
            finalize_latency_ms: rng
                .gen_range(self.finalize_latency_ms.min..self.finalize_latency_ms.max),
            fee: self.fee_for(params.priority),
            predictability: rng.gen_range(self.predictability_pct.min..self.predictability_pct.max),
            priority_level: PriorityLevel::from_priority(params.priority),
            size_bytes: params.size_bytes,
        };

        debug!(
            size_bytes = params.size_bytes,
            priority = params.priority,
            success = result.success,
            fee = %result.fee,
            "What-if simulation"
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn simulator() -> WhatIfSimulator {
        WhatIfSimulator::new(&SimulatorConfig::default(), &FeedConfig::default())
    }

    #[test]
    fn test_fee_scales_with_priority() {
        let sim = simulator();
        assert_eq!(sim.fee_for(0), dec!(0.0003));
        assert_eq!(sim.fee_for(50), dec!(0.00055));
        assert_eq!(sim.fee_for(100), dec!(0.0008));
    }

    #[test]
    fn test_priority_levels() {
        assert_eq!(PriorityLevel::from_priority(0), PriorityLevel::Low);
        assert_eq!(PriorityLevel::from_priority(40), PriorityLevel::Low);
        assert_eq!(PriorityLevel::from_priority(41), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_priority(70), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_priority(71), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_priority(100), PriorityLevel::High);
        assert_eq!(PriorityLevel::High.to_string(), "High");
    }

    #[test]
    fn test_results_stay_in_range() {
        let sim = simulator();
        let mut rng = StdRng::seed_from_u64(11);
        let params = SimulationParams::default();
        for _ in 0..1_000 {
            let r = sim.simulate(&params, &mut rng).unwrap();
            assert!((20..70).contains(&r.preconfirm_latency_ms));
            assert!((400..600).contains(&r.finalize_latency_ms));
            assert!((85.0..95.0).contains(&r.predictability));
            assert_eq!(r.fee, dec!(0.00055));
            assert_eq!(r.priority_level, PriorityLevel::Medium);
            assert_eq!(r.size_bytes, 250);
        }
    }

    #[test]
    fn test_success_rate_near_configured() {
        let sim = simulator();
        let mut rng = StdRng::seed_from_u64(12);
        let params = SimulationParams::default();
        let wins = (0..5_000)
            .filter(|_| sim.simulate(&params, &mut rng).unwrap().success)
            .count();
        assert!((4_300..=4_700).contains(&wins), "wins {wins}/5000");
    }

    #[test]
    fn test_rejects_out_of_range_params() {
        let sim = simulator();
        let mut rng = StdRng::seed_from_u64(13);
        for params in [
            SimulationParams { size_bytes: 99, priority: 50 },
            SimulationParams { size_bytes: 1_001, priority: 50 },
            SimulationParams { size_bytes: 250, priority: 101 },
        ] {
            let err = sim.simulate(&params, &mut rng).unwrap_err();
            assert!(matches!(err, FeedError::InvalidParams(_)), "{params:?}");
        }
        assert!(SimulationParams { size_bytes: 100, priority: 0 }.validate().is_ok());
        assert!(SimulationParams { size_bytes: 1_000, priority: 100 }.validate().is_ok());
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let params: SimulationParams = serde_json::from_str(r#"{"priority": 80}"#).unwrap();
        assert_eq!(params, SimulationParams { size_bytes: 250, priority: 80 });
    }

    #[test]
    fn test_result_serializes_for_dashboard() {
        let sim = simulator();
        let mut rng = StdRng::seed_from_u64(14);
        let r = sim.simulate(&SimulationParams::default(), &mut rng).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["priority_level"], "medium");
        assert!(json["fee"].is_number());
    }
}
