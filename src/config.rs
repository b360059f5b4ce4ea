//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default matching the reference feed behavior, so a
//! missing file or a partial file is fine.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::types::FeedError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Half-open sampling range `[min, max)`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Span<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd> Span<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// True when nothing can be sampled from the range.
    pub fn is_empty(&self) -> bool {
        // Written this way so NaN bounds count as empty.
        !(self.min < self.max)
    }

    pub fn contains(&self, value: &T) -> bool {
        *value >= self.min && *value < self.max
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedConfig {
    /// Maximum number of transactions retained, newest first.
    pub capacity: usize,
    /// Gap between consecutive submissions.
    pub submit_interval_ms: Span<u64>,
    /// Delay from submission to the preconfirm-or-fail event.
    pub preconfirm_delay_ms: Span<u64>,
    /// Delay from submission (not from preconfirmation) to finalization.
    pub finalize_delay_ms: Span<u64>,
    pub preconfirm_latency_ms: Span<u32>,
    pub finalize_latency_ms: Span<u32>,
    pub fee_sol: Span<f64>,
    pub size_bytes: Span<u32>,
    /// Probability that a pending transaction preconfirms rather than fails.
    pub success_probability: f64,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
    pub start_paused: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            submit_interval_ms: Span::new(2000, 3000),
            preconfirm_delay_ms: Span::new(500, 1500),
            finalize_delay_ms: Span::new(2000, 4000),
            preconfirm_latency_ms: Span::new(20, 70),
            finalize_latency_ms: Span::new(400, 600),
            fee_sol: Span::new(0.0003, 0.0008),
            size_bytes: Span::new(200, 500),
            success_probability: 0.9,
            seed: None,
            start_paused: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Fee paid at priority 0.
    pub base_fee_sol: f64,
    /// Extra fee paid at priority 100.
    pub priority_fee_span_sol: f64,
    pub success_probability: f64,
    pub predictability_pct: Span<f64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            base_fee_sol: 0.0003,
            priority_fee_span_sol: 0.0005,
            success_probability: 0.9,
            predictability_pct: Span::new(85.0, 95.0),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is
    /// an error.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            warn!(path, "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to load config file: {path}"))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine or the simulator cannot sample from.
    pub fn validate(&self) -> Result<(), FeedError> {
        self.feed.validate()?;
        self.simulator.validate()
    }
}

impl FeedConfig {
    /// Reject settings the feed cannot sample from.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.capacity == 0 {
            return Err(FeedError::Config("feed.capacity must be positive".into()));
        }

        let spans = [
            ("feed.submit_interval_ms", self.submit_interval_ms.is_empty()),
            ("feed.preconfirm_delay_ms", self.preconfirm_delay_ms.is_empty()),
            ("feed.finalize_delay_ms", self.finalize_delay_ms.is_empty()),
            ("feed.preconfirm_latency_ms", self.preconfirm_latency_ms.is_empty()),
            ("feed.finalize_latency_ms", self.finalize_latency_ms.is_empty()),
            ("feed.fee_sol", self.fee_sol.is_empty()),
            ("feed.size_bytes", self.size_bytes.is_empty()),
        ];
        if let Some((name, _)) = spans.iter().find(|(_, empty)| *empty) {
            return Err(FeedError::Config(format!("{name} must satisfy min < max")));
        }

        if self.fee_sol.min < 0.0 {
            return Err(FeedError::Config("feed.fee_sol must be non-negative".into()));
        }

        // Finalize must never be able to fire before preconfirmation.
        if self.finalize_delay_ms.min < self.preconfirm_delay_ms.max {
            return Err(FeedError::Config(format!(
                "feed.finalize_delay_ms.min ({}) must be >= feed.preconfirm_delay_ms.max ({})",
                self.finalize_delay_ms.min, self.preconfirm_delay_ms.max,
            )));
        }

        check_probability("feed.success_probability", self.success_probability)
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.predictability_pct.is_empty() {
            return Err(FeedError::Config(
                "simulator.predictability_pct must satisfy min < max".into(),
            ));
        }
        if self.base_fee_sol < 0.0 || self.priority_fee_span_sol < 0.0 {
            return Err(FeedError::Config("simulator fees must be non-negative".into()));
        }
        check_probability("simulator.success_probability", self.success_probability)
    }
}

fn check_probability(name: &str, p: f64) -> Result<(), FeedError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(FeedError::Config(format!("{name} must be within [0, 1], got {p}")))
    }
}
