//! Order fill simulation.
//!
//! Implements rejection draws, spread plus sampled slippage applied against
//! the trader, bounded fill latency, and the taker fee.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use super::position::Side;

const BPS: f64 = 10_000.0;

/// Execution cost parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FillConfig {
    pub spread_bps: f64,
    pub slippage_bps: f64,
    pub reject_prob: f64,
    pub max_latency: Duration,
}

impl Default for FillConfig {
    fn default() -> Self {
        FillConfig {
            spread_bps: 0.0,
            slippage_bps: 0.0,
            reject_prob: 0.0,
            max_latency: Duration::ZERO,
        }
    }
}

/// Result of a fill attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Filled { price: f64, latency: Duration },
    Rejected,
}

impl FillOutcome {
    pub fn price(&self) -> Option<f64> {
        match self {
            FillOutcome::Filled { price, .. } => Some(*price),
            FillOutcome::Rejected => None,
        }
    }
}

/// Taker fee on a notional.
pub fn calculate_fee(notional: f64, fee_rate: f64) -> f64 {
    notional * fee_rate
}

/// Moves `mid` against the trader by `offset_bps`.
/// Short entry (sell): mid * (1 - bps); long entry (buy): mid * (1 + bps).
pub fn adverse_price(side: Side, mid: f64, offset_bps: f64) -> f64 {
    let offset = mid * offset_bps / BPS;
    match side {
        Side::Short => mid - offset,
        Side::Long => mid + offset,
    }
}

/// Fill simulator owning its random source so runs can be reproduced.
#[derive(Debug, Clone)]
pub struct FillModel<R = StdRng> {
    config: FillConfig,
    rng: R,
    pending_latency: Duration,
}

impl FillModel<StdRng> {
    pub fn seeded(config: FillConfig, seed: u64) -> Self {
        FillModel::new(config, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(config: FillConfig) -> Self {
        FillModel::new(config, StdRng::from_entropy())
    }
}

impl<R: Rng> FillModel<R> {
    pub fn new(config: FillConfig, rng: R) -> Self {
        FillModel {
            config,
            rng,
            pending_latency: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &FillConfig {
        &self.config
    }

    /// Latency of the last fill, cleared on read. Callers that model the
    /// delay wait this long before acting on the fill.
    pub fn take_latency(&mut self) -> Duration {
        std::mem::take(&mut self.pending_latency)
    }

    /// One fill attempt at `mid`.
    ///
    /// Draw order: rejection uniform, slippage gaussian, latency uniform.
    pub fn simulate(&mut self, side: Side, mid: f64) -> FillOutcome {
        self.pending_latency = Duration::ZERO;
        let reject_draw: f64 = self.rng.gen_range(0.0..1.0);
        if reject_draw < self.config.reject_prob {
            return FillOutcome::Rejected;
        }

        let slippage_bps = self
            .sample_normal(self.config.slippage_bps, self.config.slippage_bps / 2.0)
            .abs();
        let price = adverse_price(side, mid, self.config.spread_bps + slippage_bps);

        let latency = if self.config.max_latency.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(
                self.rng
                    .gen_range(0.0..=self.config.max_latency.as_secs_f64()),
            )
        };
        self.pending_latency = latency;

        FillOutcome::Filled { price, latency }
    }

    // Box-Muller transform for normal distribution
    fn sample_normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1: f64 = 1.0 - self.rng.gen_range(0.0..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}
