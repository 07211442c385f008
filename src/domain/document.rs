//! The persisted best-parameters document and its results summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::backtest::TraderConfig;
use super::metrics::BacktestMetrics;
use super::strategy::StrategyParams;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Headline numbers for the winning combination, rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    #[serde(rename = "Total Trades")]
    pub total_trades: usize,
    #[serde(rename = "Wins")]
    pub wins: usize,
    #[serde(rename = "Losses")]
    pub losses: usize,
    #[serde(rename = "Win Rate %")]
    pub win_rate_pct: f64,
    #[serde(rename = "Total PnL")]
    pub total_pnl: f64,
    #[serde(rename = "Final Balance")]
    pub final_balance: f64,
    #[serde(rename = "Average Win")]
    pub average_win: f64,
    #[serde(rename = "Average Loss")]
    pub average_loss: f64,
}

pub fn summarize(metrics: &BacktestMetrics) -> ResultsSummary {
    ResultsSummary {
        total_trades: metrics.total_trades(),
        wins: metrics.wins,
        losses: metrics.losses,
        win_rate_pct: round2(metrics.win_rate * 100.0),
        total_pnl: round2(metrics.pnl_value),
        final_balance: round2(metrics.final_balance),
        average_win: round2(metrics.avg_win),
        average_loss: round2(metrics.avg_loss),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestParamsDocument {
    pub generated_at: DateTime<Utc>,
    pub symbol: String,
    pub category: String,
    pub agg_minutes: u32,
    pub params: StrategyParams,
    pub results: ResultsSummary,
}

impl BestParamsDocument {
    pub fn new(config: &TraderConfig, params: StrategyParams, metrics: &BacktestMetrics) -> Self {
        BestParamsDocument {
            generated_at: Utc::now(),
            symbol: config.symbol.clone(),
            category: config.category.clone(),
            agg_minutes: config.agg_minutes,
            params,
            results: summarize(metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> BacktestMetrics {
        BacktestMetrics {
            pnl_pct: 1.23456,
            pnl_value: 12.3456,
            final_balance: 1012.3456,
            avg_win: 0.41666,
            avg_loss: -0.1234,
            win_rate: 2.0 / 3.0,
            rr_ratio: Some(3.4),
            sharpe: 1.1,
            max_drawdown: 0.01,
            wins: 2,
            losses: 1,
        }
    }

    #[test]
    fn summary_rounds_and_scales_win_rate() {
        let s = summarize(&metrics());
        assert_eq!(s.total_trades, 3);
        assert_eq!(s.win_rate_pct, 66.67);
        assert_eq!(s.total_pnl, 12.35);
        assert_eq!(s.final_balance, 1012.35);
        assert_eq!(s.average_win, 0.42);
        assert_eq!(s.average_loss, -0.12);
    }

    #[test]
    fn document_keys() {
        let doc = BestParamsDocument::new(&TraderConfig::default(), StrategyParams::default(), &metrics());
        let value = serde_json::to_value(&doc).unwrap();

        for key in ["generated_at", "symbol", "category", "agg_minutes", "params", "results"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["symbol"], "BTCUSDT");
        assert_eq!(value["params"]["sma_period"], 50);
        assert_eq!(value["results"]["Win Rate %"], 66.67);
        assert_eq!(value["results"]["Total Trades"], 3);
    }

    #[test]
    fn params_missing_a_key_fail_to_load() {
        let json = r#"{
            "generated_at": "2024-01-01T00:00:00Z",
            "symbol": "BTCUSDT",
            "category": "linear",
            "agg_minutes": 3,
            "params": {"sma_period": 20, "stoch_period": 14},
            "results": {
                "Total Trades": 0, "Wins": 0, "Losses": 0, "Win Rate %": 0.0,
                "Total PnL": 0.0, "Final Balance": 1000.0,
                "Average Win": 0.0, "Average Loss": 0.0
            }
        }"#;
        assert!(serde_json::from_str::<BestParamsDocument>(json).is_err());
    }
}
