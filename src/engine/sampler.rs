//! Randomness source for the feed.
//!
//! Every random draw the engine makes goes through [`Sampler`], so tests can
//! force branches and delays while the binary uses [`RandomSampler`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::config::FeedConfig;
use crate::types::{lamports_to_sol, sol_to_lamports};

/// Base-36 alphabet used for display signatures.
const SIGNATURE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SIGNATURE_HEAD_LEN: usize = 13;
const SIGNATURE_TAIL_LEN: usize = 4;

/// Draws every simulated quantity of a feed transaction.
#[cfg_attr(test, mockall::automock)]
pub trait Sampler: Send {
    /// Gap until the next submission.
    fn submit_interval_ms(&mut self) -> u64;

    /// Delay from submission to the preconfirm-or-fail event.
    fn preconfirm_delay_ms(&mut self) -> u64;

    /// Delay from submission to finalization.
    fn finalize_delay_ms(&mut self) -> u64;

    /// `true` if the transaction preconfirms, `false` if it fails.
    fn lands(&mut self) -> bool;

    fn preconfirm_latency_ms(&mut self) -> u32;

    fn finalize_latency_ms(&mut self) -> u32;

    /// Fee in SOL.
    fn fee(&mut self) -> Decimal;

    fn size_bytes(&mut self) -> u32;

    /// Display-only signature string.
    fn signature(&mut self) -> String;
}

/// Uniform sampler over the configured ranges.
///
/// The config must have passed [`FeedConfig::validate`];
/// empty ranges panic inside `rand`.
pub struct RandomSampler {
    rng: StdRng,
    config: FeedConfig,
}

impl RandomSampler {
    /// Seeded from `config.seed` when set, from OS entropy otherwise.
    pub fn new(config: &FeedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            config: config.clone(),
        }
    }

    fn base36(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| {
                let idx = self.rng.gen_range(0..SIGNATURE_ALPHABET.len());
                SIGNATURE_ALPHABET[idx] as char
            })
            .collect()
    }
}

impl Sampler for RandomSampler {
    fn submit_interval_ms(&mut self) -> u64 {
        let span = self.config.submit_interval_ms;
        self.rng.gen_range(span.min..span.max)
    }

    fn preconfirm_delay_ms(&mut self) -> u64 {
        let span = self.config.preconfirm_delay_ms;
        self.rng.gen_range(span.min..span.max)
    }

    fn finalize_delay_ms(&mut self) -> u64 {
        let span = self.config.finalize_delay_ms;
        self.rng.gen_range(span.min..span.max)
    }

    fn lands(&mut self) -> bool {
        self.rng.gen_bool(self.config.success_probability)
    }

    fn preconfirm_latency_ms(&mut self) -> u32 {
        let span = self.config.preconfirm_latency_ms;
        self.rng.gen_range(span.min..span.max)
    }

    fn finalize_latency_ms(&mut self) -> u32 {
        let span = self.config.finalize_latency_ms;
        self.rng.gen_range(span.min..span.max)
    }

    fn fee(&mut self) -> Decimal {
        // Drawn in whole lamports so the decimal value is exact.
        let span = self.config.fee_sol;
        let min = sol_to_lamports(span.min);
        let max = sol_to_lamports(span.max).max(min + 1);
        lamports_to_sol(self.rng.gen_range(min..max))
    }

    fn size_bytes(&mut self) -> u32 {
        let span = self.config.size_bytes;
        self.rng.gen_range(span.min..span.max)
    }

    fn signature(&mut self) -> String {
        let head = self.base36(SIGNATURE_HEAD_LEN);
        let tail = self.base36(SIGNATURE_TAIL_LEN);
        format!("{head}...{tail}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
