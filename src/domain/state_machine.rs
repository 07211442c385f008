//! Bar-by-bar FLAT / SHORT_OPEN transitions.
//!
//! Exit priority: margin call (when enabled), take-profit, momentum.
//! Entry requires the date filter, warmup, and the short entry signal.

use rand::Rng;
use tracing::debug;

use super::execution::FillModel;
use super::indicator::AnnotatedBar;
use super::order_engine::{EntryRejection, OrderEngine};
use super::portfolio::TraderState;
use super::position::{ExitType, PositionState, Side, TradeRecord};
use super::strategy::{momentum_exit_signal, short_entry_signal, StrategyParams};

/// Gating shared by the batch driver and live replay.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRules {
    pub start_year: i32,
    pub start_month: u32,
    pub check_margin_call: bool,
    pub use_raw_mid_price: bool,
    pub log_blocked_trades: bool,
}

impl Default for EngineRules {
    fn default() -> Self {
        EngineRules {
            start_year: 2020,
            start_month: 1,
            check_margin_call: false,
            use_raw_mid_price: false,
            log_blocked_trades: true,
        }
    }
}

/// Outcome of a single transition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    Idle,
    Entered(PositionState),
    Skipped(EntryRejection),
    Exited(TradeRecord),
}

pub struct StateMachine<'a> {
    params: &'a StrategyParams,
    rules: &'a EngineRules,
    orders: &'a OrderEngine,
}

impl<'a> StateMachine<'a> {
    pub fn new(params: &'a StrategyParams, rules: &'a EngineRules, orders: &'a OrderEngine) -> Self {
        StateMachine {
            params,
            rules,
            orders,
        }
    }

    /// Batch transition: flat positions may enter, open positions may exit.
    /// Never both on the same bar.
    pub fn step<R: Rng>(
        &self,
        state: &mut TraderState,
        bars: &[AnnotatedBar],
        index: usize,
        fills: &mut FillModel<R>,
    ) -> StepEvent {
        if state.is_flat() {
            self.try_enter(state, bars, index, fills)
        } else {
            self.try_exit(state, bars, index)
                .map_or(StepEvent::Idle, StepEvent::Exited)
        }
    }

    pub fn try_enter<R: Rng>(
        &self,
        state: &mut TraderState,
        bars: &[AnnotatedBar],
        index: usize,
        fills: &mut FillModel<R>,
    ) -> StepEvent {
        if !state.is_flat() || index < self.params.warmup() || index >= bars.len() {
            return StepEvent::Idle;
        }
        let bar = &bars[index].bar;
        if !bar.is_on_or_after(self.rules.start_year, self.rules.start_month) {
            return StepEvent::Idle;
        }
        if !short_entry_signal(bars, index, self.params) {
            return StepEvent::Idle;
        }

        match self.orders.open_position(
            Side::Short,
            bar,
            state.cash,
            fills,
            self.rules.use_raw_mid_price,
        ) {
            Ok(position) => {
                debug!(
                    time = %bar.timestamp,
                    entry = position.entry_price,
                    qty = position.qty,
                    tp = position.tp_price,
                    liq = position.liq_price,
                    "enter short"
                );
                state.open(position.clone());
                StepEvent::Entered(position)
            }
            Err(reason) => {
                if self.rules.log_blocked_trades {
                    debug!(time = %bar.timestamp, %reason, "entry skipped");
                }
                StepEvent::Skipped(reason)
            }
        }
    }

    pub fn try_exit(
        &self,
        state: &mut TraderState,
        bars: &[AnnotatedBar],
        index: usize,
    ) -> Option<TradeRecord> {
        let position = state.position.as_ref()?;
        let bar = &bars.get(index)?.bar;

        let (exit_price, exit_type) =
            if self.rules.check_margin_call && position.margin_call_hit(bar.high, bar.low) {
                (position.liq_price, ExitType::MarginCall)
            } else if position.take_profit_hit(bar.high, bar.low) {
                (position.tp_price, ExitType::Tp)
            } else if momentum_exit_signal(bars, index, self.params) {
                (bar.close, ExitType::Momentum)
            } else {
                return None;
            };

        let trade = state.close(exit_price, bar.timestamp, exit_type)?;
        debug!(
            time = %bar.timestamp,
            exit = trade.exit_price,
            pnl = trade.pnl_value,
            kind = %trade.exit_type,
            "exit"
        );
        Some(trade)
    }

    /// Settles whatever is still open at the last bar's close.
    pub fn force_close(&self, state: &mut TraderState, bars: &[AnnotatedBar]) -> Option<TradeRecord> {
        let last = &bars.last()?.bar;
        state.close(last.close, last.timestamp, ExitType::FinalClose)
    }
}
