//! Live replay: drives the position state machine from a polled bar feed.
//!
//! Each poll fetches the latest window, and a bar is acted on only once,
//! the first time it shows up as the newest closed bar. Exit is evaluated
//! before entry, so a position closed on a bar may be replaced on that bar.

use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use super::backtest::TraderConfig;
use super::error::ShortTraderError;
use super::execution::FillModel;
use super::indicator_helpers::annotate;
use super::order_engine::OrderEngine;
use super::portfolio::TraderState;
use super::position::TradeRecord;
use super::state_machine::{EngineRules, StateMachine, StepEvent};
use super::strategy::StrategyParams;
use crate::ports::data_port::BarSource;

/// Feed errors tolerated in a row before the loop gives up.
pub const MAX_CONSECUTIVE_ERRORS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub poll_interval: Duration,
    /// Stop after this many polls; `None` runs until the feed is exhausted.
    pub max_polls: Option<usize>,
    /// Bars per window handed to the engine by a replay feed.
    pub history_bars: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            poll_interval: Duration::ZERO,
            max_polls: None,
            history_bars: 500,
        }
    }
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The feed has nothing more to give.
    Exhausted,
    /// The newest bar was already processed.
    Stale,
    Processed {
        timestamp: NaiveDateTime,
        exit: Option<TradeRecord>,
        entry: StepEvent,
        /// How long the entry fill took to be observed.
        fill_latency: Duration,
    },
}

pub struct LiveEngine<R = StdRng> {
    params: StrategyParams,
    rules: EngineRules,
    orders: OrderEngine,
    smooth_k: usize,
    live: LiveConfig,
    state: TraderState,
    fills: FillModel<R>,
    last_processed: Option<NaiveDateTime>,
    polls: usize,
}

impl LiveEngine<StdRng> {
    pub fn from_config(config: &TraderConfig, params: StrategyParams) -> Self {
        LiveEngine::new(config, params, config.fill_model(0))
    }
}

impl<R: Rng> LiveEngine<R> {
    pub fn new(config: &TraderConfig, params: StrategyParams, fills: FillModel<R>) -> Self {
        LiveEngine {
            params,
            rules: EngineRules {
                check_margin_call: true,
                ..config.rules.clone()
            },
            orders: OrderEngine::new(config.orders.clone()),
            smooth_k: config.smooth_k,
            live: config.live.clone(),
            state: TraderState::new(config.starting_balance),
            fills,
            last_processed: None,
            polls: 0,
        }
    }

    pub fn state(&self) -> &TraderState {
        &self.state
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    pub fn poll_once<S: BarSource>(&mut self, source: &mut S) -> Result<PollOutcome, ShortTraderError> {
        self.polls += 1;
        let Some(window) = source.latest_window()? else {
            return Ok(PollOutcome::Exhausted);
        };
        let Some(newest) = window.last() else {
            return Ok(PollOutcome::Stale);
        };
        let timestamp = newest.timestamp;
        if self.last_processed.is_some_and(|seen| seen >= timestamp) {
            return Ok(PollOutcome::Stale);
        }
        self.last_processed = Some(timestamp);

        let annotated = annotate(&window, &self.params, self.smooth_k);
        let index = annotated.len() - 1;
        let machine = StateMachine::new(&self.params, &self.rules, &self.orders);

        let exit = machine.try_exit(&mut self.state, &annotated, index);
        let entry = machine.try_enter(&mut self.state, &annotated, index, &mut self.fills);
        let fill_latency = match entry {
            StepEvent::Entered(_) => self.fills.take_latency(),
            _ => Duration::ZERO,
        };
        if !fill_latency.is_zero() {
            debug!(latency_ms = fill_latency.as_millis() as u64, "waiting on fill");
            thread::sleep(fill_latency);
        }
        self.state.record_equity(timestamp);

        let bar = &annotated[index];
        match &self.state.position {
            Some(pos) => info!(
                time = %timestamp,
                qty = pos.qty,
                entry = pos.entry_price,
                tp = pos.tp_price,
                liq = pos.liq_price,
                last = bar.bar.close,
                equity = pos.mark_to_market(self.state.cash, bar.bar.close),
                "status: short"
            ),
            None => info!(
                time = %timestamp,
                last = bar.bar.close,
                sma = bar.sma.unwrap_or(f64::NAN),
                k = bar.k.unwrap_or(f64::NAN),
                macd = bar.macd,
                signal = bar.signal,
                equity = self.state.equity(),
                "status: flat"
            ),
        }

        Ok(PollOutcome::Processed {
            timestamp,
            exit,
            entry,
            fill_latency,
        })
    }

    /// Polls until the feed is exhausted or the poll budget is spent.
    pub fn run<S: BarSource>(&mut self, source: &mut S) -> Result<(), ShortTraderError> {
        info!(
            sma = self.params.sma_period,
            stoch = self.params.stoch_period,
            "live replay started"
        );
        let mut consecutive_errors = 0;

        loop {
            if self.live.max_polls.is_some_and(|max| self.polls >= max) {
                info!(polls = self.polls, "poll budget reached");
                break;
            }

            match self.poll_once(source) {
                Ok(PollOutcome::Exhausted) => {
                    info!(polls = self.polls, "feed exhausted");
                    break;
                }
                Ok(_) => consecutive_errors = 0,
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(error = %e, attempt = consecutive_errors, "poll failed");
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(e);
                    }
                }
            }

            if !self.live.poll_interval.is_zero() {
                thread::sleep(self.live.poll_interval);
            }
        }

        info!(
            trades = self.state.closed_trades.len(),
            equity = self.state.equity(),
            open = !self.state.is_flat(),
            "live replay finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::FillConfig;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::position::ExitType;
    use chrono::NaiveDate;
    use std::time::Instant;

    struct GrowingFeed {
        bars: Vec<OhlcvBar>,
        revealed: usize,
        repeat_each: bool,
        repeated: bool,
    }

    impl BarSource for GrowingFeed {
        fn latest_window(&mut self) -> Result<Option<Vec<OhlcvBar>>, ShortTraderError> {
            if self.revealed >= self.bars.len() {
                return Ok(None);
            }
            if self.repeat_each && !self.repeated && self.revealed > 0 {
                self.repeated = true;
                return Ok(Some(self.bars[..self.revealed].to_vec()));
            }
            self.repeated = false;
            self.revealed += 1;
            Ok(Some(self.bars[..self.revealed].to_vec()))
        }
    }

    struct FailingFeed;

    impl BarSource for FailingFeed {
        fn latest_window(&mut self) -> Result<Option<Vec<OhlcvBar>>, ShortTraderError> {
            Err(ShortTraderError::Data {
                reason: "feed down".into(),
            })
        }
    }

    fn bar(i: i64, low: f64, high: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::minutes(3 * i),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    fn params() -> StrategyParams {
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

    // Same shape as the batch driver tests: entry on bar 4, bar 6 spikes
    // through the liquidation level.
    fn bars_with_spike() -> Vec<OhlcvBar> {
        vec![
            bar(0, 109.0, 110.5, 110.0),
            bar(1, 109.0, 110.5, 110.0),
            bar(2, 109.0, 110.5, 110.0),
            bar(3, 108.0, 109.5, 109.0),
            bar(4, 107.0, 108.5, 108.0),
            bar(5, 107.8, 108.5, 108.0),
            bar(6, 107.9, 130.0, 120.0),
        ]
    }

    fn engine() -> LiveEngine {
        let config = TraderConfig {
            seed: Some(4),
            ..Default::default()
        };
        LiveEngine::new(&config, params(), FillModel::seeded(FillConfig::default(), 4))
    }

    #[test]
    fn margin_call_in_live_replay() {
        let mut live = engine();
        let mut feed = GrowingFeed {
            bars: bars_with_spike(),
            revealed: 0,
            repeat_each: false,
            repeated: false,
        };
        live.run(&mut feed).unwrap();

        let trades = &live.state().closed_trades;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_type, ExitType::MarginCall);
        assert_eq!(trades[0].exit_price, live_liq(108.0));
        assert!(trades[0].pnl_value < 0.0);
    }

    fn live_liq(entry: f64) -> f64 {
        entry * (1.0 + 0.1 - 0.004)
    }

    #[test]
    fn repeated_bar_is_processed_once() {
        let mut live = engine();
        let mut feed = GrowingFeed {
            bars: bars_with_spike(),
            revealed: 0,
            repeat_each: true,
            repeated: false,
        };
        live.run(&mut feed).unwrap();
        assert_eq!(live.state().equity_curve.len(), 7);
        assert!(live.polls() > 7);
    }

    #[test]
    fn max_polls_stops_loop() {
        let config = TraderConfig {
            live: LiveConfig {
                max_polls: Some(3),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut live = LiveEngine::new(&config, params(), FillModel::seeded(FillConfig::default(), 4));
        let mut feed = GrowingFeed {
            bars: bars_with_spike(),
            revealed: 0,
            repeat_each: false,
            repeated: false,
        };
        live.run(&mut feed).unwrap();
        assert_eq!(live.polls(), 3);
        assert_eq!(live.state().equity_curve.len(), 3);
    }

    #[test]
    fn entry_waits_for_fill_latency() {
        let config = TraderConfig {
            seed: Some(4),
            ..Default::default()
        };
        let fill = FillConfig {
            max_latency: Duration::from_millis(40),
            ..Default::default()
        };
        let mut live = LiveEngine::new(&config, params(), FillModel::seeded(fill, 4));
        let mut feed = GrowingFeed {
            bars: bars_with_spike(),
            revealed: 0,
            repeat_each: false,
            repeated: false,
        };

        let mut entered = None;
        loop {
            let started = Instant::now();
            match live.poll_once(&mut feed).unwrap() {
                PollOutcome::Exhausted => break,
                PollOutcome::Processed {
                    entry: StepEvent::Entered(_),
                    fill_latency,
                    ..
                } => {
                    assert!(started.elapsed() >= fill_latency);
                    entered = Some(fill_latency);
                }
                PollOutcome::Processed { fill_latency, .. } => {
                    assert_eq!(fill_latency, Duration::ZERO);
                }
                PollOutcome::Stale => {}
            }
        }

        let latency = entered.expect("no entry");
        assert!(latency <= Duration::from_millis(40));
    }

    #[test]
    fn persistent_feed_errors_surface() {
        let mut live = engine();
        assert!(live.run(&mut FailingFeed).is_err());
        assert_eq!(live.polls(), MAX_CONSECUTIVE_ERRORS);
    }
}
