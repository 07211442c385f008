//! Position opening: fill, sizing, leverage and liquidation level.
//!
//! Steps:
//! 1. Fill at the bar close through the fill model (or at the raw close)
//! 2. Reject when no funds are available or the risk fraction clamps to 0
//! 3. Size margin as equity * clamped risk fraction
//! 4. Derive notional from the margin rate or the tiered leverage resolver
//! 5. Reject notionals below the exchange minimum
//! 6. Compute qty, fee, take-profit and liquidation price

use rand::Rng;

use super::execution::{calculate_fee, FillModel, FillOutcome};
use super::leverage::LeverageConfig;
use super::ohlcv::OhlcvBar;
use super::position::{PositionState, Side};

/// How notional is derived from committed margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    /// notional = margin / margin_rate
    MarginRate,
    /// notional = margin * resolved leverage
    Leverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfig {
    pub fee_rate: f64,
    pub risk_fraction: f64,
    pub max_risk_fraction: f64,
    pub margin_rate: f64,
    pub min_notional: f64,
    pub sizing: SizingMode,
    pub leverage: LeverageConfig,
}

impl Default for OrderConfig {
    fn default() -> Self {
        OrderConfig {
            fee_rate: 0.0,
            risk_fraction: 0.95,
            max_risk_fraction: 0.95,
            margin_rate: 0.10,
            min_notional: 1.0,
            sizing: SizingMode::MarginRate,
            leverage: LeverageConfig::default(),
        }
    }
}

/// Why an entry did not open a position. None of these are fatal; the bar
/// is skipped and the next qualifying signal tries again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntryRejection {
    #[error("order rejected by the fill model")]
    OrderRejected,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("risk fraction is zero")]
    RiskFractionZero,
    #[error("notional below exchange minimum")]
    BelowMinNotional,
}

#[derive(Debug, Clone)]
pub struct OrderEngine {
    config: OrderConfig,
}

impl OrderEngine {
    pub fn new(config: OrderConfig) -> Self {
        OrderEngine { config }
    }

    pub fn config(&self) -> &OrderConfig {
        &self.config
    }

    fn effective_risk_fraction(&self) -> f64 {
        self.config
            .risk_fraction
            .max(0.0)
            .min(self.config.max_risk_fraction)
    }

    /// Notional and leverage for a given margin.
    pub fn size(&self, margin_used: f64) -> (f64, f64) {
        match self.config.sizing {
            SizingMode::MarginRate => {
                let notional = margin_used / self.config.margin_rate;
                (notional, 1.0 / self.config.margin_rate)
            }
            SizingMode::Leverage => {
                let leverage = self
                    .config
                    .leverage
                    .resolve(margin_used, self.config.leverage.desired_leverage);
                (margin_used * leverage, leverage)
            }
        }
    }

    /// Opens a position on `bar` using `available` equity.
    pub fn open_position<R: Rng>(
        &self,
        side: Side,
        bar: &OhlcvBar,
        available: f64,
        fills: &mut FillModel<R>,
        use_raw_mid_price: bool,
    ) -> Result<PositionState, EntryRejection> {
        let entry_price = if use_raw_mid_price {
            bar.close
        } else {
            match fills.simulate(side, bar.close) {
                FillOutcome::Filled { price, .. } => price,
                FillOutcome::Rejected => return Err(EntryRejection::OrderRejected),
            }
        };

        if available <= 0.0 {
            return Err(EntryRejection::InsufficientFunds);
        }

        let risk_fraction = self.effective_risk_fraction();
        if risk_fraction <= 0.0 {
            return Err(EntryRejection::RiskFractionZero);
        }

        let margin_used = available * risk_fraction;
        let (notional, leverage) = self.size(margin_used);
        if notional < self.config.min_notional {
            return Err(EntryRejection::BelowMinNotional);
        }

        let qty = notional / entry_price;
        if !(qty > 0.0 && qty.is_finite()) {
            return Err(EntryRejection::InsufficientFunds);
        }

        let liq_price = self.config.leverage.liquidation_price(
            side,
            entry_price,
            leverage,
            self.config.fee_rate,
        );

        Ok(PositionState {
            side,
            entry_price,
            tp_price: PositionState::take_profit_for(side, entry_price),
            liq_price,
            qty,
            margin_used,
            leverage,
            trade_value: notional,
            entry_fee: calculate_fee(notional, self.config.fee_rate),
            entry_time: bar.timestamp,
        })
    }
}
