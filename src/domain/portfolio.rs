//! Per-run trader state: cash, the single position slot, closed trades and
//! the equity curve. Owned by one run, never shared.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::position::{ExitType, PositionState, TradeRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraderState {
    pub cash: f64,
    pub starting_balance: f64,
    pub position: Option<PositionState>,
    pub closed_trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl TraderState {
    pub fn new(starting_balance: f64) -> Self {
        TraderState {
            cash: starting_balance,
            starting_balance,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Cash plus margin locked in the open position. Open PnL is not marked.
    pub fn equity(&self) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.margin_used)
    }

    /// Locks the position's margin. Ignored if a position is already open.
    pub fn open(&mut self, position: PositionState) -> bool {
        if self.position.is_some() {
            return false;
        }
        self.cash -= position.margin_used;
        self.position = Some(position);
        true
    }

    /// Closes the open position at `exit_price`, crediting margin plus PnL.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        exit_type: ExitType,
    ) -> Option<TradeRecord> {
        let position = self.position.take()?;
        let pnl_value = position.pnl_at(exit_price);
        self.cash += position.margin_used + pnl_value;

        let pnl_pct = if self.starting_balance > 0.0 {
            pnl_value / self.starting_balance * 100.0
        } else {
            0.0
        };

        let trade = TradeRecord {
            side: position.side,
            entry_time: position.entry_time,
            exit_time,
            entry_price: position.entry_price,
            exit_price,
            pnl_value,
            pnl_pct,
            qty: position.qty,
            exit_type,
        };
        self.closed_trades.push(trade.clone());
        Some(trade)
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime) {
        let equity = self.equity();
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Re-marks the most recent equity point, used after a settlement on the
    /// bar that was already recorded.
    pub fn restate_last_equity(&mut self) {
        let equity = self.equity();
        if let Some(last) = self.equity_curve.last_mut() {
            last.equity = equity;
        }
    }
}
