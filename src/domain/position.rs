//! Position tracking and closed-trade records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::strategy::TAKE_PROFIT_FRACTION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Short,
    Long,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Short => write!(f, "SHORT"),
            Side::Long => write!(f, "LONG"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitType {
    Tp,
    Momentum,
    MarginCall,
    FinalClose,
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitType::Tp => "tp",
            ExitType::Momentum => "momentum",
            ExitType::MarginCall => "margin_call",
            ExitType::FinalClose => "final_close",
        };
        f.write_str(s)
    }
}

/// The single open position. Shared by the batch driver and live replay.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    pub side: Side,
    pub entry_price: f64,
    pub tp_price: f64,
    pub liq_price: f64,
    pub qty: f64,
    pub margin_used: f64,
    pub leverage: f64,
    pub trade_value: f64,
    pub entry_fee: f64,
    pub entry_time: NaiveDateTime,
}

impl PositionState {
    /// Fixed take-profit level for a fill at `entry_price`.
    pub fn take_profit_for(side: Side, entry_price: f64) -> f64 {
        match side {
            Side::Short => entry_price * (1.0 - TAKE_PROFIT_FRACTION),
            Side::Long => entry_price * (1.0 + TAKE_PROFIT_FRACTION),
        }
    }

    /// Realized PnL when closed at `exit_price`.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Short => (self.entry_price - exit_price) * self.qty,
            Side::Long => (exit_price - self.entry_price) * self.qty,
        }
    }

    /// Bar range reached the take-profit level.
    pub fn take_profit_hit(&self, high: f64, low: f64) -> bool {
        match self.side {
            Side::Short => low <= self.tp_price,
            Side::Long => high >= self.tp_price,
        }
    }

    /// Bar range crossed the liquidation level.
    pub fn margin_call_hit(&self, high: f64, low: f64) -> bool {
        match self.side {
            Side::Short => high >= self.liq_price,
            Side::Long => low <= self.liq_price,
        }
    }

    /// Cash plus locked margin plus open PnL at `last_price`.
    pub fn mark_to_market(&self, cash: f64, last_price: f64) -> f64 {
        cash + self.margin_used + self.pnl_at(last_price)
    }
}

/// Immutable result of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub side: Side,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl_value: f64,
    pub pnl_pct: f64,
    pub qty: f64,
    pub exit_type: ExitType,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.pnl_value > 0.0
    }
}
