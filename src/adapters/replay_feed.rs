//! Simulated live feed over recorded bars.

use crate::domain::error::ShortTraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::BarSource;

/// Reveals one more recorded bar per poll and hands back the trailing
/// `history` bars, the way an exchange returns a fixed lookback.
pub struct ReplayFeed {
    bars: Vec<OhlcvBar>,
    revealed: usize,
    history: usize,
}

impl ReplayFeed {
    /// `start` bars are visible before the first poll.
    pub fn new(bars: Vec<OhlcvBar>, history: usize, start: usize) -> Self {
        Self {
            revealed: start.min(bars.len()),
            bars,
            history: history.max(1),
        }
    }

    pub fn remaining(&self) -> usize {
        self.bars.len() - self.revealed
    }
}

impl BarSource for ReplayFeed {
    fn latest_window(&mut self) -> Result<Option<Vec<OhlcvBar>>, ShortTraderError> {
        if self.revealed >= self.bars.len() {
            return Ok(None);
        }
        self.revealed += 1;
        let from = self.revealed.saturating_sub(self.history);
        Ok(Some(self.bars[from..self.revealed].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars(n: usize) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| OhlcvBar {
                timestamp: start + Duration::minutes(3 * i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn reveals_one_bar_per_poll() {
        let mut feed = ReplayFeed::new(bars(5), 10, 2);
        assert_eq!(feed.latest_window().unwrap().unwrap().len(), 3);
        assert_eq!(feed.latest_window().unwrap().unwrap().len(), 4);
        assert_eq!(feed.remaining(), 1);
    }

    #[test]
    fn window_is_capped_at_history() {
        let mut feed = ReplayFeed::new(bars(10), 3, 6);
        let window = feed.latest_window().unwrap().unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window.last().unwrap().close, 106.0);
        assert_eq!(window[0].close, 104.0);
    }

    #[test]
    fn exhausted_after_last_bar() {
        let mut feed = ReplayFeed::new(bars(2), 5, 0);
        assert!(feed.latest_window().unwrap().is_some());
        assert!(feed.latest_window().unwrap().is_some());
        assert!(feed.latest_window().unwrap().is_none());
    }
}
