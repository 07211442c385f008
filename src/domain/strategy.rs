//! Strategy parameters and the short-entry / momentum-exit rules.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::AnnotatedBar;
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};

/// Favorable move that triggers the fixed take-profit.
pub const TAKE_PROFIT_FRACTION: f64 = 0.004;

/// Fully determines indicator computation and entry/exit gating for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyParams {
    pub sma_period: usize,
    pub stoch_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub use_macd: bool,
    pub use_signal: bool,
    pub use_momentum_exit: bool,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            sma_period: 50,
            stoch_period: 14,
            macd_fast: DEFAULT_FAST,
            macd_slow: DEFAULT_SLOW,
            macd_signal: DEFAULT_SIGNAL,
            use_macd: true,
            use_signal: true,
            use_momentum_exit: true,
        }
    }
}

impl StrategyParams {
    /// Leading bars that are never decision-eligible.
    pub fn warmup(&self) -> usize {
        self.sma_period
            .max(self.stoch_period)
            .max(self.macd_slow)
            .max(self.macd_signal)
            + 2
    }
}

fn declining(current: Option<f64>, previous: Option<f64>) -> bool {
    matches!((current, previous), (Some(c), Some(p)) if c < p)
}

/// Short entry: two consecutive falling lows, a declining SMA, and the
/// optional MACD / signal-line declines.
pub fn short_entry_signal(bars: &[AnnotatedBar], index: usize, params: &StrategyParams) -> bool {
    if index < 2 || index >= bars.len() {
        return false;
    }
    let (two_back, prev, cur) = (&bars[index - 2], &bars[index - 1], &bars[index]);

    let lows_ok = two_back.bar.low >= prev.bar.low && cur.bar.low < prev.bar.low;
    let sma_ok = declining(cur.sma, prev.sma);
    let macd_ok = !params.use_macd || cur.macd < prev.macd;
    let signal_ok = !params.use_signal || cur.signal < prev.signal;

    lows_ok && sma_ok && macd_ok && signal_ok
}

/// Momentum exit: the centered stochastic turns up versus the prior bar.
pub fn momentum_exit_signal(bars: &[AnnotatedBar], index: usize, params: &StrategyParams) -> bool {
    if !params.use_momentum_exit || index == 0 || index >= bars.len() {
        return false;
    }
    matches!((bars[index].k, bars[index - 1].k), (Some(c), Some(p)) if c > p)
}
