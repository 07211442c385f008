//! CSV bar data adapter.
//!
//! Expected columns: `timestamp,open,high,low,close,volume`. The timestamp
//! may be epoch milliseconds, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
//! or a bare date.

use crate::domain::error::ShortTraderError;
use crate::domain::ohlcv::{is_strictly_increasing, OhlcvBar};
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    /// `base_path` is either a single CSV file or a directory holding
    /// `{symbol}_{agg}m.csv` files.
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, agg_minutes: u32) -> PathBuf {
        if self.base_path.is_dir() {
            self.base_path.join(format!("{}_{}m.csv", symbol, agg_minutes))
        } else {
            self.base_path.clone()
        }
    }
}

fn data_error(reason: String) -> ShortTraderError {
    ShortTraderError::Data { reason }
}

fn field<'r>(record: &'r StringRecord, index: usize, name: &str, line: usize) -> Result<&'r str, ShortTraderError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| data_error(format!("line {line}: missing {name} column")))
}

fn price(record: &StringRecord, index: usize, name: &str, line: usize) -> Result<f64, ShortTraderError> {
    let raw = field(record, index, name, line)?;
    raw.parse()
        .map_err(|e| data_error(format!("line {line}: invalid {name} value '{raw}': {e}")))
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(ms) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str, agg_minutes: u32) -> Result<Vec<OhlcvBar>, ShortTraderError> {
        let path = self.csv_path(symbol, agg_minutes);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record = result.map_err(|e| data_error(format!("CSV parse error: {}", e)))?;

            let raw_ts = field(&record, 0, "timestamp", line)?;
            let timestamp = parse_timestamp(raw_ts)
                .ok_or_else(|| data_error(format!("line {line}: invalid timestamp '{raw_ts}'")))?;

            bars.push(OhlcvBar {
                timestamp,
                open: price(&record, 1, "open", line)?,
                high: price(&record, 2, "high", line)?,
                low: price(&record, 3, "low", line)?,
                close: price(&record, 4, "close", line)?,
                volume: price(&record, 5, "volume", line)?,
            });
        }

        if bars.is_empty() {
            return Err(ShortTraderError::NoData {
                symbol: symbol.to_string(),
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        if !is_strictly_increasing(&bars) {
            return Err(data_error(format!(
                "duplicate timestamps in {}",
                path.display()
            )));
        }
        Ok(bars)
    }
}
