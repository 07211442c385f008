//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values
//! - `AnnotatedBar`: a bar joined with every value the strategy reads

pub mod ema;
pub mod macd;
pub mod sma;
pub mod stochastic;

pub use ema::ema_values;
pub use macd::calculate_macd;
pub use sma::calculate_sma;
pub use stochastic::calculate_stochastic;

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        raw_k: f64,
        centered_k: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Stochastic { period: usize, smooth_k: usize },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub(crate) fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Primary scalar at `index`, `None` while the series is still warming up.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        let point = self.values.get(index)?;
        if !point.valid {
            return None;
        }
        match point.value {
            IndicatorValue::Simple(v) => Some(v),
            IndicatorValue::Macd { line, .. } => Some(line),
            IndicatorValue::Stochastic { centered_k, .. } => Some(centered_k),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Stochastic { period, smooth_k } => {
                write!(f, "STOCH({},{})", period, smooth_k)
            }
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}

/// A bar plus the derived values the entry/exit rules consume.
///
/// `sma` and `k` are `None` until their rolling windows fill; MACD and
/// signal are defined from the first bar because the EMAs seed on it.
#[derive(Debug, Clone)]
pub struct AnnotatedBar {
    pub bar: OhlcvBar,
    pub sma: Option<f64>,
    pub k: Option<f64>,
    pub macd: f64,
    pub signal: f64,
}
