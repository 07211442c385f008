//! Margin, tiered leverage limits and liquidation prices.

use super::position::Side;

/// One exchange tier: notional up to `notional_threshold` may use at most `max_leverage`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeverageTier {
    pub notional_threshold: f64,
    pub max_leverage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeverageConfig {
    pub desired_leverage: f64,
    pub max_leverage: f64,
    pub maintenance_margin_rate: f64,
    pub tiers: Vec<LeverageTier>,
}

impl Default for LeverageConfig {
    fn default() -> Self {
        LeverageConfig {
            desired_leverage: 10.0,
            max_leverage: 50.0,
            maintenance_margin_rate: 0.004,
            tiers: vec![
                LeverageTier {
                    notional_threshold: 50_000.0,
                    max_leverage: 50.0,
                },
                LeverageTier {
                    notional_threshold: 200_000.0,
                    max_leverage: 25.0,
                },
                LeverageTier {
                    notional_threshold: 500_000.0,
                    max_leverage: 10.0,
                },
            ],
        }
    }
}

impl LeverageConfig {
    /// Leverage the exchange allows for `notional`: the tier with the smallest
    /// threshold at or above it, else the last tier, capped and floored at 1.
    pub fn allowed_for_notional(&self, notional: f64) -> f64 {
        let mut sorted = self.tiers.clone();
        sorted.sort_by(|a, b| a.notional_threshold.total_cmp(&b.notional_threshold));

        let tier_leverage = sorted
            .iter()
            .find(|t| notional <= t.notional_threshold)
            .or(sorted.last())
            .map(|t| t.max_leverage)
            .unwrap_or(self.max_leverage);

        tier_leverage.min(self.max_leverage).floor().max(1.0)
    }

    /// Clamps `desired` against the cap and the tiers until the implied
    /// notional fits. Leverage only ever decreases, so this terminates.
    pub fn resolve(&self, margin: f64, desired: f64) -> f64 {
        if margin <= 0.0 {
            return 1.0;
        }
        let mut leverage = desired.min(self.max_leverage);
        loop {
            let allowed = self.allowed_for_notional(margin * leverage);
            if leverage <= allowed || leverage <= 1.0 {
                return leverage.max(1.0);
            }
            leverage = allowed;
        }
    }

    pub fn liquidation_price(&self, side: Side, entry_price: f64, leverage: f64, taker_fee: f64) -> f64 {
        match side {
            Side::Short => liquidation_price_short(
                entry_price,
                leverage,
                self.maintenance_margin_rate,
                taker_fee,
            ),
            Side::Long => liquidation_price_long(entry_price, leverage),
        }
    }
}

/// entry * (1 + 1/leverage - mmr + fee), floored at 0.
pub fn liquidation_price_short(entry_price: f64, leverage: f64, maintenance_margin_rate: f64, taker_fee: f64) -> f64 {
    (entry_price * (1.0 + 1.0 / leverage - maintenance_margin_rate + taker_fee)).max(0.0)
}

/// entry * (1 - 1/leverage)
pub fn liquidation_price_long(entry_price: f64, leverage: f64) -> f64 {
    entry_price * (1.0 - 1.0 / leverage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_notional_keeps_desired() {
        let cfg = LeverageConfig::default();
        assert_eq!(cfg.resolve(950.0, 10.0), 10.0);
    }

    #[test]
    fn cap_applies_before_tiers() {
        let cfg = LeverageConfig::default();
        assert_eq!(cfg.resolve(100.0, 75.0), 50.0);
    }

    #[test]
    fn tier_clamps_large_notional() {
        let cfg = LeverageConfig::default();
        // 10_000 * 50 = 500k → tier (500k, 10); 10_000 * 10 = 100k → tier (200k, 25) allows 10.
        assert_eq!(cfg.resolve(10_000.0, 50.0), 10.0);
    }

    #[test]
    fn above_all_tiers_uses_last() {
        let cfg = LeverageConfig::default();
        assert_eq!(cfg.allowed_for_notional(1_000_000.0), 10.0);
        // 200k * 10 = 2M, above every threshold: last tier leverage 10 still holds.
        assert_eq!(cfg.resolve(200_000.0, 50.0), 10.0);
    }

    #[test]
    fn tiers_unsorted_input() {
        let mut cfg = LeverageConfig::default();
        cfg.tiers.reverse();
        assert_eq!(cfg.allowed_for_notional(100_000.0), 25.0);
    }

    #[test]
    fn floor_at_one() {
        let cfg = LeverageConfig {
            tiers: vec![LeverageTier {
                notional_threshold: 10.0,
                max_leverage: 0.0,
            }],
            ..Default::default()
        };
        assert_eq!(cfg.resolve(100.0, 5.0), 1.0);
        assert_eq!(cfg.resolve(0.0, 5.0), 1.0);
    }

    #[test]
    fn resolve_is_idempotent() {
        let cfg = LeverageConfig::default();
        for &(margin, desired) in &[(950.0, 10.0), (10_000.0, 50.0), (40_000.0, 30.0), (3.0, 0.5)] {
            let first = cfg.resolve(margin, desired);
            assert_eq!(cfg.resolve(margin, first), first);
        }
    }

    #[test]
    fn liquidation_short_formula() {
        let liq = liquidation_price_short(100.0, 10.0, 0.004, 0.0);
        assert!((liq - 100.0 * (1.0 + 0.1 - 0.004)).abs() < 1e-12);
    }

    #[test]
    fn liquidation_short_floored_at_zero() {
        assert_eq!(liquidation_price_short(100.0, 1.0, 3.0, 0.0), 0.0);
    }

    #[test]
    fn liquidation_long_formula() {
        assert!((liquidation_price_long(100.0, 4.0) - 75.0).abs() < 1e-12);
    }
}
