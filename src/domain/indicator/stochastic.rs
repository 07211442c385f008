//! Centered stochastic oscillator.
//!
//! raw %K = 100 * (C - LL(n)) / (HH(n) - LL(n)), forced to 0 when the window
//! is incomplete or the high/low range is flat. The smoothed value is the
//! `smooth_k`-bar mean of raw %K, shifted down by 50 so it oscillates around 0.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_SMOOTH_K: usize = 2;

pub fn calculate_stochastic(bars: &[OhlcvBar], period: usize, smooth_k: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { period, smooth_k };
    if period == 0 || smooth_k == 0 || bars.is_empty() {
        return IndicatorSeries::empty(indicator_type);
    }

    let raw: Vec<f64> = (0..bars.len()).map(|i| raw_k(bars, i, period)).collect();

    let mut values = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        window_sum += raw[i];
        if i >= smooth_k {
            window_sum -= raw[i - smooth_k];
        }
        let valid = i + 1 >= smooth_k;
        let centered_k = if valid {
            window_sum / smooth_k as f64 - 50.0
        } else {
            0.0
        };
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Stochastic {
                raw_k: raw[i],
                centered_k,
            },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

fn raw_k(bars: &[OhlcvBar], index: usize, period: usize) -> f64 {
    if index + 1 < period {
        return 0.0;
    }
    let window = &bars[index + 1 - period..=index];
    let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let range = highest - lowest;
    let value = 100.0 * (bars[index].close - lowest) / range;
    if value.is_finite() { value } else { 0.0 }
}
