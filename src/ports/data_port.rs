//! Bar data port traits.

use crate::domain::error::ShortTraderError;
use crate::domain::ohlcv::OhlcvBar;

/// Historical bars for a symbol, oldest first.
pub trait DataPort {
    fn fetch_bars(&self, symbol: &str, agg_minutes: u32) -> Result<Vec<OhlcvBar>, ShortTraderError>;
}

/// A polled feed for live replay.
pub trait BarSource {
    /// The latest window of closed bars, oldest first. `None` once the feed
    /// has nothing more to deliver.
    fn latest_window(&mut self) -> Result<Option<Vec<OhlcvBar>>, ShortTraderError>;
}
