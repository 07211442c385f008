//! Indicator pipeline: computes every series a run needs and joins them
//! onto the bars.

use crate::domain::indicator::macd::split_lines;
use crate::domain::indicator::{
    calculate_macd, calculate_sma, calculate_stochastic, AnnotatedBar,
};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::StrategyParams;
use tracing::trace;

/// Annotates `bars` causally: the value at index `i` depends only on bars `0..=i`.
pub fn annotate(bars: &[OhlcvBar], params: &StrategyParams, smooth_k: usize) -> Vec<AnnotatedBar> {
    if bars.is_empty() {
        return Vec::new();
    }

    let sma = calculate_sma(bars, params.sma_period);
    let stoch = calculate_stochastic(bars, params.stoch_period, smooth_k);
    let macd = calculate_macd(bars, params.macd_fast, params.macd_slow, params.macd_signal);
    let (macd_line, signal_line) = split_lines(&macd);
    trace!(
        bars = bars.len(),
        sma = %sma.indicator_type,
        stoch = %stoch.indicator_type,
        macd = %macd.indicator_type,
        "indicators computed"
    );

    bars.iter()
        .enumerate()
        .map(|(i, bar)| AnnotatedBar {
            bar: bar.clone(),
            sma: sma.value_at(i),
            k: stoch.value_at(i),
            macd: macd_line.get(i).copied().unwrap_or(0.0),
            signal: signal_line.get(i).copied().unwrap_or(0.0),
        })
        .collect()
}
