//! Backtest driver and the run configuration it consumes.

use rand::Rng;
use tracing::debug;

use super::execution::{FillConfig, FillModel};
use super::indicator::stochastic::DEFAULT_SMOOTH_K;
use super::indicator_helpers::annotate;
use super::live::LiveConfig;
use super::metrics::BacktestMetrics;
use super::ohlcv::OhlcvBar;
use super::order_engine::{OrderConfig, OrderEngine};
use super::portfolio::{EquityPoint, TraderState};
use super::position::TradeRecord;
use super::state_machine::{EngineRules, StateMachine};
use super::strategy::StrategyParams;
use super::sweep::ParamGrid;

/// Settings for a whole session: market, account, costs, gating, the
/// default strategy and the sweep grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    pub symbol: String,
    pub category: String,
    pub agg_minutes: u32,
    pub starting_balance: f64,
    pub smooth_k: usize,
    /// Base seed for fill simulation; `None` draws from entropy.
    pub seed: Option<u64>,
    pub fill: FillConfig,
    pub orders: OrderConfig,
    pub rules: EngineRules,
    pub strategy: StrategyParams,
    pub sweep: ParamGrid,
    pub live: LiveConfig,
}

impl Default for TraderConfig {
    fn default() -> Self {
        TraderConfig {
            symbol: "BTCUSDT".to_string(),
            category: "linear".to_string(),
            agg_minutes: 3,
            starting_balance: 1000.0,
            smooth_k: DEFAULT_SMOOTH_K,
            seed: None,
            fill: FillConfig::default(),
            orders: OrderConfig::default(),
            rules: EngineRules::default(),
            strategy: StrategyParams::default(),
            sweep: ParamGrid::default(),
            live: LiveConfig::default(),
        }
    }
}

impl TraderConfig {
    /// Fill model for the `stream`-th independent run.
    pub fn fill_model(&self, stream: u64) -> FillModel {
        match self.seed {
            Some(seed) => FillModel::seeded(self.fill.clone(), seed.wrapping_add(stream)),
            None => FillModel::from_entropy(self.fill.clone()),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub params: StrategyParams,
    pub metrics: BacktestMetrics,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Runs `params` over `bars` from warmup to the last bar.
///
/// Equity is recorded once per processed bar. A position still open at the
/// end is settled at the last close and the final equity point restated.
/// Too few bars yields zeroed metrics instead of an error.
pub fn run_backtest<R: Rng>(
    bars: &[OhlcvBar],
    params: &StrategyParams,
    config: &TraderConfig,
    fills: &mut FillModel<R>,
) -> BacktestReport {
    let warmup = params.warmup();
    if bars.len() <= warmup {
        debug!(bars = bars.len(), warmup, "not enough bars for a run");
        return BacktestReport {
            params: *params,
            metrics: BacktestMetrics::zeroed(config.starting_balance),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        };
    }

    let annotated = annotate(bars, params, config.smooth_k);
    let orders = OrderEngine::new(config.orders.clone());
    let machine = StateMachine::new(params, &config.rules, &orders);
    let mut state = TraderState::new(config.starting_balance);

    for (i, bar) in annotated.iter().enumerate().skip(warmup) {
        machine.step(&mut state, &annotated, i, fills);
        state.record_equity(bar.bar.timestamp);
    }

    if machine.force_close(&mut state, &annotated).is_some() {
        state.restate_last_equity();
    }

    let metrics = BacktestMetrics::compute(
        &state.closed_trades,
        &state.equity_curve,
        config.starting_balance,
        config.agg_minutes,
    );

    BacktestReport {
        params: *params,
        metrics,
        trades: state.closed_trades,
        equity_curve: state.equity_curve,
    }
}
