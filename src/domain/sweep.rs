//! Exhaustive parameter search over a Cartesian grid.

use rayon::prelude::*;
use tracing::{debug, info};

use super::backtest::{run_backtest, TraderConfig};
use super::metrics::BacktestMetrics;
use super::ohlcv::OhlcvBar;
use super::position::TradeRecord;
use super::strategy::StrategyParams;

/// Candidate values for each swept parameter. MACD periods are not swept.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub sma_periods: Vec<usize>,
    pub stoch_periods: Vec<usize>,
    pub use_macd_options: Vec<bool>,
    pub use_signal_options: Vec<bool>,
    pub use_momentum_exit_options: Vec<bool>,
    pub parallel: bool,
}

impl Default for ParamGrid {
    fn default() -> Self {
        ParamGrid {
            sma_periods: vec![50],
            stoch_periods: vec![14],
            use_macd_options: vec![true, false],
            use_signal_options: vec![true, false],
            use_momentum_exit_options: vec![true, false],
            parallel: false,
        }
    }
}

impl ParamGrid {
    pub fn size(&self) -> usize {
        self.sma_periods.len()
            * self.stoch_periods.len()
            * self.use_macd_options.len()
            * self.use_signal_options.len()
            * self.use_momentum_exit_options.len()
    }

    /// Every combination in product order (sma outermost, momentum innermost),
    /// taking the MACD periods from `base`.
    pub fn combinations(&self, base: &StrategyParams) -> Vec<StrategyParams> {
        let mut combos = Vec::with_capacity(self.size());
        for &sma_period in &self.sma_periods {
            for &stoch_period in &self.stoch_periods {
                for &use_macd in &self.use_macd_options {
                    for &use_signal in &self.use_signal_options {
                        for &use_momentum_exit in &self.use_momentum_exit_options {
                            combos.push(StrategyParams {
                                sma_period,
                                stoch_period,
                                use_macd,
                                use_signal,
                                use_momentum_exit,
                                ..*base
                            });
                        }
                    }
                }
            }
        }
        combos
    }
}

/// One evaluated combination. Trades are kept only for the winner.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow {
    pub params: StrategyParams,
    pub metrics: BacktestMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub rows: Vec<SearchRow>,
    pub best: Option<usize>,
    /// Trades of the best row, from a re-run on the same fill stream.
    pub best_trades: Vec<TradeRecord>,
}

impl SearchOutcome {
    pub fn best_row(&self) -> Option<&SearchRow> {
        self.best.and_then(|i| self.rows.get(i))
    }
}

/// Index of the row with the largest pnl_pct; the earliest row wins ties.
pub fn select_best(rows: &[SearchRow]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, row) in rows.iter().enumerate() {
        match best {
            Some(b) if row.metrics.pnl_pct <= rows[b].metrics.pnl_pct => {}
            _ => best = Some(i),
        }
    }
    best
}

fn evaluate(bars: &[OhlcvBar], params: &StrategyParams, config: &TraderConfig, index: usize) -> SearchRow {
    let mut fills = config.fill_model(index as u64);
    let report = run_backtest(bars, params, config, &mut fills);
    debug!(
        sma = params.sma_period,
        stoch = params.stoch_period,
        macd = params.use_macd,
        signal = params.use_signal,
        momentum = params.use_momentum_exit,
        pnl_pct = report.metrics.pnl_pct,
        trades = report.trades.len(),
        "combination evaluated"
    );
    SearchRow {
        params: report.params,
        metrics: report.metrics,
    }
}

/// Runs every grid combination against the same bars.
///
/// Rows come back in product order whether or not the grid runs in
/// parallel, so best selection does not depend on scheduling. An unseeded
/// config draws one base seed up front so the winner can be replayed.
pub fn run_search(bars: &[OhlcvBar], config: &TraderConfig) -> SearchOutcome {
    let config = &TraderConfig {
        seed: Some(config.seed.unwrap_or_else(rand::random)),
        ..config.clone()
    };
    let combos = config.sweep.combinations(&config.strategy);
    info!(
        combinations = combos.len(),
        parallel = config.sweep.parallel,
        "starting parameter search"
    );

    let rows: Vec<SearchRow> = if config.sweep.parallel {
        combos
            .par_iter()
            .enumerate()
            .map(|(i, params)| evaluate(bars, params, config, i))
            .collect()
    } else {
        combos
            .iter()
            .enumerate()
            .map(|(i, params)| evaluate(bars, params, config, i))
            .collect()
    };

    let best = select_best(&rows);
    let mut best_trades = Vec::new();
    if let Some((i, row)) = best.and_then(|i| rows.get(i).map(|row| (i, row))) {
        info!(
            sma = row.params.sma_period,
            stoch = row.params.stoch_period,
            pnl_pct = row.metrics.pnl_pct,
            "best combination"
        );
        let mut fills = config.fill_model(i as u64);
        best_trades = run_backtest(bars, &row.params, config, &mut fills).trades;
    }

    SearchOutcome {
        rows,
        best,
        best_trades,
    }
}
