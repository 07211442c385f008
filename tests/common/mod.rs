#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use shorttrader::domain::backtest::TraderConfig;
use shorttrader::domain::error::ShortTraderError;
pub use shorttrader::domain::ohlcv::OhlcvBar;
use shorttrader::domain::strategy::StrategyParams;
use shorttrader::domain::sweep::ParamGrid;
use shorttrader::ports::data_port::BarSource;
use std::collections::VecDeque;
use std::io::Write;

/// Feeds a fixed script of windows, then reports exhaustion.
pub struct MockBarSource {
    pub windows: VecDeque<Result<Vec<OhlcvBar>, String>>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self {
            windows: VecDeque::new(),
        }
    }

    pub fn with_window(mut self, bars: Vec<OhlcvBar>) -> Self {
        self.windows.push_back(Ok(bars));
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.windows.push_back(Err(reason.to_string()));
        self
    }

    /// One window per bar, each holding every bar up to and including it.
    pub fn growing(bars: &[OhlcvBar]) -> Self {
        let mut source = Self::new();
        for end in 1..=bars.len() {
            source = source.with_window(bars[..end].to_vec());
        }
        source
    }
}

impl BarSource for MockBarSource {
    fn latest_window(&mut self) -> Result<Option<Vec<OhlcvBar>>, ShortTraderError> {
        match self.windows.pop_front() {
            None => Ok(None),
            Some(Ok(bars)) => Ok(Some(bars)),
            Some(Err(reason)) => Err(ShortTraderError::Data { reason }),
        }
    }
}

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::minutes(3 * i as i64)
}

pub fn make_bar(i: usize, low: f64, high: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: ts(i),
        open: close,
        high,
        low,
        close,
        volume: 1.0,
    }
}

/// Small periods so the warmup is 4 bars.
pub fn fast_params() -> StrategyParams {
    StrategyParams {
        sma_period: 2,
        stoch_period: 2,
        macd_fast: 1,
        macd_slow: 2,
        macd_signal: 1,
        use_macd: false,
        use_signal: false,
        use_momentum_exit: false,
    }
}

/// Flat, then two falling lows with a falling SMA: bar 4 enters at 108.
/// Bar 5 stays above the take-profit.
pub fn falling_entry() -> Vec<OhlcvBar> {
    vec![
        make_bar(0, 109.0, 110.5, 110.0),
        make_bar(1, 109.0, 110.5, 110.0),
        make_bar(2, 109.0, 110.5, 110.0),
        make_bar(3, 108.0, 109.5, 109.0),
        make_bar(4, 107.0, 108.5, 108.0),
        make_bar(5, 107.8, 108.5, 108.0),
    ]
}

/// 70 bars: flat at 100, a dip on bar 25 and a take-profit on bar 26, then
/// flat at 99. Only a 20-bar SMA is warmed up in time to catch the dip.
pub fn early_dip_series() -> Vec<OhlcvBar> {
    (0..70)
        .map(|i| match i {
            0..=24 => make_bar(i, 99.5, 100.5, 100.0),
            25 => make_bar(i, 98.5, 99.5, 99.0),
            26 => make_bar(i, 98.0, 99.0, 98.5),
            _ => make_bar(i, 98.5, 99.5, 99.0),
        })
        .collect()
}

pub fn seeded_config() -> TraderConfig {
    TraderConfig {
        symbol: "TESTUSDT".to_string(),
        seed: Some(11),
        strategy: fast_params(),
        sweep: ParamGrid {
            sma_periods: vec![2],
            stoch_periods: vec![2],
            use_macd_options: vec![false],
            use_signal_options: vec![false],
            use_momentum_exit_options: vec![false],
            parallel: false,
        },
        ..Default::default()
    }
}

pub fn bars_to_csv(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
