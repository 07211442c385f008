//! Run-level performance metrics.

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::position::TradeRecord;

const MINUTES_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestMetrics {
    pub pnl_pct: f64,
    pub pnl_value: f64,
    pub final_balance: f64,
    /// Mean pnl_pct of winning trades.
    pub avg_win: f64,
    /// Mean pnl_pct of losing trades (zero or negative).
    pub avg_loss: f64,
    /// wins / (wins + losses), as a fraction.
    pub win_rate: f64,
    pub rr_ratio: Option<f64>,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub wins: usize,
    pub losses: usize,
}

impl BacktestMetrics {
    /// Metrics for a run that produced nothing.
    pub fn zeroed(starting_balance: f64) -> Self {
        BacktestMetrics {
            pnl_pct: 0.0,
            pnl_value: 0.0,
            final_balance: starting_balance,
            avg_win: 0.0,
            avg_loss: 0.0,
            win_rate: 0.0,
            rr_ratio: None,
            sharpe: 0.0,
            max_drawdown: 0.0,
            wins: 0,
            losses: 0,
        }
    }

    pub fn total_trades(&self) -> usize {
        self.wins + self.losses
    }

    pub fn compute(
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
        starting_balance: f64,
        agg_minutes: u32,
    ) -> Self {
        let Some(last) = equity_curve.last() else {
            return Self::zeroed(starting_balance);
        };

        let final_balance = last.equity;
        let pnl_value = final_balance - starting_balance;
        let pnl_pct = if starting_balance > 0.0 {
            pnl_value / starting_balance * 100.0
        } else {
            0.0
        };

        // Breakeven trades count as losses so every trade lands in one bucket.
        let (win_sizes, loss_sizes): (Vec<f64>, Vec<f64>) = {
            let (w, l): (Vec<&TradeRecord>, Vec<&TradeRecord>) =
                trades.iter().partition(|t| t.is_win());
            (
                w.iter().map(|t| t.pnl_pct).collect(),
                l.iter().map(|t| t.pnl_pct).collect(),
            )
        };

        let wins = win_sizes.len();
        let losses = loss_sizes.len();
        let avg_win = mean(&win_sizes);
        let avg_loss = mean(&loss_sizes);
        let win_rate = if wins + losses > 0 {
            wins as f64 / (wins + losses) as f64
        } else {
            0.0
        };
        let rr_ratio = if avg_loss != 0.0 {
            Some(avg_win / avg_loss.abs())
        } else {
            None
        };

        BacktestMetrics {
            pnl_pct,
            pnl_value,
            final_balance,
            avg_win,
            avg_loss,
            win_rate,
            rr_ratio,
            sharpe: compute_sharpe(equity_curve, bars_per_year(agg_minutes)),
            max_drawdown: compute_drawdown(equity_curve),
            wins,
            losses,
        }
    }
}

pub fn bars_per_year(agg_minutes: u32) -> f64 {
    MINUTES_PER_YEAR / f64::from(agg_minutes.max(1))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Largest peak-to-trough decline as a fraction of the peak.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }
    max_dd
}

/// Annualized Sharpe of bar-to-bar equity returns, sample standard deviation.
/// Zero when there are fewer than two returns or no variance.
fn compute_sharpe(equity_curve: &[EquityPoint], periods_per_year: f64) -> f64 {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0].equity != 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > 0.0 && stddev.is_finite() {
        mean / stddev * periods_per_year.sqrt()
    } else {
        0.0
    }
}
