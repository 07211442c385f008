//! OHLCV bar representation.

use chrono::{Datelike, NaiveDateTime};

/// One aggregated OHLCV sample. Bars are never mutated once produced;
/// derived indicator values live alongside them in [`AnnotatedBar`](crate::domain::indicator::AnnotatedBar).
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// True when the bar falls on or after the given year/month.
    pub fn is_on_or_after(&self, year: i32, month: u32) -> bool {
        let bar_year = self.timestamp.year();
        bar_year > year || (bar_year == year && self.timestamp.month() >= month)
    }
}

/// Checks that timestamps strictly increase.
pub fn is_strictly_increasing(bars: &[OhlcvBar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}
