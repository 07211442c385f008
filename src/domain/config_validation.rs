//! Builds a [`TraderConfig`] from the INI sections and validates it.
//!
//! Missing keys take their defaults. Values that are present but malformed
//! or out of range are reported with their section and key.

use std::str::FromStr;
use std::time::Duration;

use crate::domain::backtest::TraderConfig;
use crate::domain::error::ShortTraderError;
use crate::domain::leverage::LeverageTier;
use crate::domain::order_engine::SizingMode;
use crate::domain::strategy::StrategyParams;
use crate::ports::config_port::ConfigPort;

const MARKET: &str = "market";
const ACCOUNT: &str = "account";
const EXECUTION: &str = "execution";
const LEVERAGE: &str = "leverage";
const FILTER: &str = "filter";
const STRATEGY: &str = "strategy";
const SWEEP: &str = "sweep";
const LIVE: &str = "live";

pub fn build_trader_config(config: &dyn ConfigPort) -> Result<TraderConfig, ShortTraderError> {
    let mut cfg = TraderConfig::default();

    if let Some(symbol) = config.get_string(MARKET, "symbol") {
        cfg.symbol = symbol.trim().to_string();
    }
    if let Some(category) = config.get_string(MARKET, "category") {
        cfg.category = category.trim().to_string();
    }
    cfg.agg_minutes = positive(config, MARKET, "agg_minutes", cfg.agg_minutes)?;

    cfg.starting_balance = value(config, ACCOUNT, "starting_balance", cfg.starting_balance)?;
    let orders = &mut cfg.orders;
    orders.fee_rate = value(config, ACCOUNT, "fee_rate", orders.fee_rate)?;
    orders.risk_fraction = value(config, ACCOUNT, "risk_fraction", orders.risk_fraction)?;
    orders.max_risk_fraction =
        value(config, ACCOUNT, "max_risk_fraction", orders.max_risk_fraction)?;
    orders.margin_rate = value(config, ACCOUNT, "margin_rate", orders.margin_rate)?;
    orders.min_notional = value(config, ACCOUNT, "min_notional", orders.min_notional)?;

    let fill = &mut cfg.fill;
    fill.spread_bps = value(config, EXECUTION, "spread_bps", fill.spread_bps)?;
    fill.slippage_bps = value(config, EXECUTION, "slippage_bps", fill.slippage_bps)?;
    fill.reject_prob = value(config, EXECUTION, "order_reject_prob", fill.reject_prob)?;
    let latency_ms: u64 = value(config, EXECUTION, "max_fill_latency_ms", 0)?;
    fill.max_latency = Duration::from_millis(latency_ms);
    cfg.seed = optional(config, EXECUTION, "seed")?;
    cfg.rules.use_raw_mid_price = flag(config, EXECUTION, "use_raw_mid_price", false)?;
    if let Some(sizing) = config.get_string(EXECUTION, "sizing") {
        orders_sizing(&mut cfg.orders.sizing, &sizing)?;
    }

    let leverage = &mut cfg.orders.leverage;
    leverage.desired_leverage =
        value(config, LEVERAGE, "desired_leverage", leverage.desired_leverage)?;
    leverage.max_leverage = value(config, LEVERAGE, "max_leverage", leverage.max_leverage)?;
    leverage.maintenance_margin_rate = value(
        config,
        LEVERAGE,
        "maintenance_margin_rate",
        leverage.maintenance_margin_rate,
    )?;
    if let Some(raw) = config.get_string(LEVERAGE, "tiers") {
        leverage.tiers = parse_tiers(&raw)?;
    }

    cfg.rules.start_year = value(config, FILTER, "start_year", cfg.rules.start_year)?;
    cfg.rules.start_month = value(config, FILTER, "start_month", cfg.rules.start_month)?;
    if !(1..=12).contains(&cfg.rules.start_month) {
        return Err(ShortTraderError::invalid(FILTER, "start_month", "must be 1..=12"));
    }
    cfg.rules.log_blocked_trades =
        flag(config, FILTER, "log_blocked_trades", cfg.rules.log_blocked_trades)?;

    let s = &mut cfg.strategy;
    s.sma_period = positive(config, STRATEGY, "sma_period", s.sma_period)?;
    s.stoch_period = positive(config, STRATEGY, "stoch_period", s.stoch_period)?;
    s.macd_fast = positive(config, STRATEGY, "macd_fast", s.macd_fast)?;
    s.macd_slow = positive(config, STRATEGY, "macd_slow", s.macd_slow)?;
    s.macd_signal = positive(config, STRATEGY, "macd_signal", s.macd_signal)?;
    s.use_macd = flag(config, STRATEGY, "use_macd", s.use_macd)?;
    s.use_signal = flag(config, STRATEGY, "use_signal", s.use_signal)?;
    s.use_momentum_exit = flag(config, STRATEGY, "use_momentum_exit", s.use_momentum_exit)?;
    cfg.smooth_k = positive(config, STRATEGY, "smooth_k", cfg.smooth_k)?;

    let grid = &mut cfg.sweep;
    if let Some(items) = config.get_list(SWEEP, "sma_period_range") {
        grid.sma_periods = parse_items(SWEEP, "sma_period_range", &items, |s| s.parse().ok())?;
    }
    if let Some(items) = config.get_list(SWEEP, "stoch_period_range") {
        grid.stoch_periods = parse_items(SWEEP, "stoch_period_range", &items, |s| s.parse().ok())?;
    }
    if let Some(items) = config.get_list(SWEEP, "use_macd_options") {
        grid.use_macd_options = parse_items(SWEEP, "use_macd_options", &items, parse_bool)?;
    }
    if let Some(items) = config.get_list(SWEEP, "use_signal_options") {
        grid.use_signal_options = parse_items(SWEEP, "use_signal_options", &items, parse_bool)?;
    }
    if let Some(items) = config.get_list(SWEEP, "use_momentum_exit_options") {
        grid.use_momentum_exit_options =
            parse_items(SWEEP, "use_momentum_exit_options", &items, parse_bool)?;
    }
    grid.parallel = flag(config, SWEEP, "parallel", grid.parallel)?;

    let interval: f64 = value(config, LIVE, "poll_interval_secs", 0.0)?;
    if !(interval >= 0.0) {
        return Err(ShortTraderError::invalid(LIVE, "poll_interval_secs", "must be non-negative"));
    }
    cfg.live.poll_interval = Duration::try_from_secs_f64(interval)
        .map_err(|_| ShortTraderError::invalid(LIVE, "poll_interval_secs", "out of range"))?;
    cfg.live.max_polls = optional(config, LIVE, "max_polls")?;
    cfg.live.history_bars = positive(config, LIVE, "history_bars", cfg.live.history_bars)?;

    validate_trader_config(&cfg)?;
    Ok(cfg)
}

/// A replay window must reach past the warmup, or no bar is ever eligible
/// for entry.
pub fn validate_replay_window(
    cfg: &TraderConfig,
    params: &StrategyParams,
) -> Result<(), ShortTraderError> {
    let warmup = params.warmup();
    if cfg.live.history_bars <= warmup {
        return Err(ShortTraderError::invalid(
            LIVE,
            "history_bars",
            format!("must exceed the strategy warmup of {warmup} bars"),
        ));
    }
    Ok(())
}

pub fn validate_trader_config(cfg: &TraderConfig) -> Result<(), ShortTraderError> {
    validate_account(cfg)?;
    validate_execution(cfg)?;
    validate_leverage(cfg)?;
    validate_strategy(cfg)?;
    validate_sweep(cfg)?;
    Ok(())
}

fn validate_account(cfg: &TraderConfig) -> Result<(), ShortTraderError> {
    if cfg.symbol.is_empty() {
        return Err(ShortTraderError::ConfigMissing {
            section: MARKET.to_string(),
            key: "symbol".to_string(),
        });
    }
    if cfg.agg_minutes < 1 {
        return Err(ShortTraderError::invalid(MARKET, "agg_minutes", "must be at least 1"));
    }
    if !(cfg.starting_balance > 0.0) {
        return Err(ShortTraderError::invalid(ACCOUNT, "starting_balance", "must be positive"));
    }
    let o = &cfg.orders;
    if !(o.fee_rate >= 0.0) {
        return Err(ShortTraderError::invalid(ACCOUNT, "fee_rate", "must be non-negative"));
    }
    if !(o.risk_fraction > 0.0 && o.risk_fraction <= 1.0) {
        return Err(ShortTraderError::invalid(ACCOUNT, "risk_fraction", "must be in (0, 1]"));
    }
    if !(o.max_risk_fraction > 0.0 && o.max_risk_fraction <= 1.0) {
        return Err(ShortTraderError::invalid(
            ACCOUNT,
            "max_risk_fraction",
            "must be in (0, 1]",
        ));
    }
    if !(o.margin_rate > 0.0 && o.margin_rate <= 1.0) {
        return Err(ShortTraderError::invalid(ACCOUNT, "margin_rate", "must be in (0, 1]"));
    }
    if !(o.min_notional >= 0.0) {
        return Err(ShortTraderError::invalid(ACCOUNT, "min_notional", "must be non-negative"));
    }
    Ok(())
}

fn validate_execution(cfg: &TraderConfig) -> Result<(), ShortTraderError> {
    let f = &cfg.fill;
    if !(f.spread_bps >= 0.0) {
        return Err(ShortTraderError::invalid(EXECUTION, "spread_bps", "must be non-negative"));
    }
    if !(f.slippage_bps >= 0.0) {
        return Err(ShortTraderError::invalid(EXECUTION, "slippage_bps", "must be non-negative"));
    }
    if !(0.0..=1.0).contains(&f.reject_prob) {
        return Err(ShortTraderError::invalid(
            EXECUTION,
            "order_reject_prob",
            "must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_leverage(cfg: &TraderConfig) -> Result<(), ShortTraderError> {
    let l = &cfg.orders.leverage;
    if !(l.desired_leverage >= 1.0) {
        return Err(ShortTraderError::invalid(LEVERAGE, "desired_leverage", "must be at least 1"));
    }
    if !(l.max_leverage >= 1.0) {
        return Err(ShortTraderError::invalid(LEVERAGE, "max_leverage", "must be at least 1"));
    }
    if !(l.maintenance_margin_rate >= 0.0 && l.maintenance_margin_rate < 1.0) {
        return Err(ShortTraderError::invalid(
            LEVERAGE,
            "maintenance_margin_rate",
            "must be in [0, 1)",
        ));
    }
    if l.tiers.is_empty() {
        return Err(ShortTraderError::invalid(LEVERAGE, "tiers", "at least one tier is required"));
    }
    if l
        .tiers
        .iter()
        .any(|t| !(t.notional_threshold > 0.0) || !(t.max_leverage >= 1.0))
    {
        return Err(ShortTraderError::invalid(
            LEVERAGE,
            "tiers",
            "thresholds must be positive and leverage at least 1",
        ));
    }
    Ok(())
}

fn validate_strategy(cfg: &TraderConfig) -> Result<(), ShortTraderError> {
    let s = &cfg.strategy;
    let periods = [
        ("sma_period", s.sma_period),
        ("stoch_period", s.stoch_period),
        ("macd_fast", s.macd_fast),
        ("macd_slow", s.macd_slow),
        ("macd_signal", s.macd_signal),
        ("smooth_k", cfg.smooth_k),
    ];
    if let Some((key, _)) = periods.iter().find(|(_, p)| *p == 0) {
        return Err(ShortTraderError::invalid(STRATEGY, key, "must be at least 1"));
    }
    if s.macd_fast >= s.macd_slow {
        return Err(ShortTraderError::invalid(
            STRATEGY,
            "macd_fast",
            "must be less than macd_slow",
        ));
    }
    if !(1..=12).contains(&cfg.rules.start_month) {
        return Err(ShortTraderError::invalid(FILTER, "start_month", "must be 1..=12"));
    }
    Ok(())
}

fn validate_sweep(cfg: &TraderConfig) -> Result<(), ShortTraderError> {
    let g = &cfg.sweep;
    let lists = [
        ("sma_period_range", g.sma_periods.is_empty()),
        ("stoch_period_range", g.stoch_periods.is_empty()),
        ("use_macd_options", g.use_macd_options.is_empty()),
        ("use_signal_options", g.use_signal_options.is_empty()),
        ("use_momentum_exit_options", g.use_momentum_exit_options.is_empty()),
    ];
    if let Some((key, _)) = lists.iter().find(|(_, empty)| *empty) {
        return Err(ShortTraderError::invalid(SWEEP, key, "must list at least one value"));
    }
    if g.sma_periods.contains(&0) {
        return Err(ShortTraderError::invalid(SWEEP, "sma_period_range", "periods must be at least 1"));
    }
    if g.stoch_periods.contains(&0) {
        return Err(ShortTraderError::invalid(
            SWEEP,
            "stoch_period_range",
            "periods must be at least 1",
        ));
    }
    Ok(())
}

fn value<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, ShortTraderError> {
    Ok(optional(config, section, key)?.unwrap_or(default))
}

fn positive<T: FromStr + PartialOrd + From<u8>>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, ShortTraderError> {
    let parsed = value(config, section, key, default)?;
    if parsed < T::from(1) {
        return Err(ShortTraderError::invalid(section, key, "must be at least 1"));
    }
    Ok(parsed)
}

fn flag(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, ShortTraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => parse_bool(&raw).ok_or_else(|| {
            ShortTraderError::invalid(section, key, format!("expected true or false, got '{}'", raw.trim()))
        }),
    }
}

fn optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, ShortTraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ShortTraderError::invalid(section, key, format!("cannot parse '{}'", raw.trim()))),
    }
}

fn parse_items<T>(
    section: &str,
    key: &str,
    items: &[String],
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, ShortTraderError> {
    items
        .iter()
        .map(|item| {
            parse(item).ok_or_else(|| {
                ShortTraderError::invalid(section, key, format!("cannot parse '{item}'"))
            })
        })
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn orders_sizing(sizing: &mut SizingMode, raw: &str) -> Result<(), ShortTraderError> {
    *sizing = match raw.trim().to_lowercase().as_str() {
        "margin_rate" => SizingMode::MarginRate,
        "leverage" => SizingMode::Leverage,
        other => {
            return Err(ShortTraderError::invalid(
                EXECUTION,
                "sizing",
                format!("expected margin_rate or leverage, got '{other}'"),
            ));
        }
    };
    Ok(())
}

/// `threshold:leverage` pairs separated by commas, e.g. `50000:50,200000:25`.
pub fn parse_tiers(raw: &str) -> Result<Vec<LeverageTier>, ShortTraderError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let bad = || ShortTraderError::invalid(LEVERAGE, "tiers", format!("bad tier '{pair}'"));
            let (threshold, leverage) = pair.split_once(':').ok_or_else(bad)?;
            Ok(LeverageTier {
                notional_threshold: threshold.trim().parse().map_err(|_| bad())?,
                max_leverage: leverage.trim().parse().map_err(|_| bad())?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(content: &str, expected_key: &str) {
        match build_trader_config(&make_config(content)) {
            Err(ShortTraderError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected invalid {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = build_trader_config(&make_config("")).unwrap();
        assert_eq!(cfg, TraderConfig::default());
    }

    #[test]
    fn full_config_is_read() {
        let content = r#"
[market]
symbol = SOLUSDT
category = linear
agg_minutes = 5

[account]
starting_balance = 2000
fee_rate = 0.0006
risk_fraction = 0.5
margin_rate = 0.2

[execution]
spread_bps = 1.5
slippage_bps = 2
order_reject_prob = 0.1
max_fill_latency_ms = 250
seed = 42
sizing = leverage

[leverage]
desired_leverage = 20
tiers = 10000:25, 100000:10

[filter]
start_year = 2023
start_month = 6
log_blocked_trades = false

[strategy]
sma_period = 30
smooth_k = 3
use_macd = false

[sweep]
sma_period_range = 20,50
use_macd_options = false
parallel = true

[live]
poll_interval_secs = 1.5
max_polls = 10
"#;
        let cfg = build_trader_config(&make_config(content)).unwrap();
        assert_eq!(cfg.symbol, "SOLUSDT");
        assert_eq!(cfg.agg_minutes, 5);
        assert_eq!(cfg.starting_balance, 2000.0);
        assert_eq!(cfg.orders.fee_rate, 0.0006);
        assert_eq!(cfg.orders.sizing, SizingMode::Leverage);
        assert_eq!(cfg.fill.max_latency, Duration::from_millis(250));
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.orders.leverage.desired_leverage, 20.0);
        assert_eq!(cfg.orders.leverage.tiers.len(), 2);
        assert_eq!(cfg.rules.start_year, 2023);
        assert_eq!(cfg.rules.start_month, 6);
        assert!(!cfg.rules.log_blocked_trades);
        assert_eq!(cfg.strategy.sma_period, 30);
        assert!(!cfg.strategy.use_macd);
        assert_eq!(cfg.smooth_k, 3);
        assert_eq!(cfg.sweep.sma_periods, vec![20, 50]);
        assert_eq!(cfg.sweep.use_macd_options, vec![false]);
        assert!(cfg.sweep.parallel);
        assert_eq!(cfg.live.poll_interval, Duration::from_millis(1500));
        assert_eq!(cfg.live.max_polls, Some(10));
    }

    #[test]
    fn starting_balance_must_be_positive() {
        assert_invalid("[account]\nstarting_balance = 0\n", "starting_balance");
    }

    #[test]
    fn risk_fraction_above_one_fails() {
        assert_invalid("[account]\nrisk_fraction = 1.5\n", "risk_fraction");
    }

    #[test]
    fn margin_rate_zero_fails() {
        assert_invalid("[account]\nmargin_rate = 0\n", "margin_rate");
    }

    #[test]
    fn reject_probability_out_of_range_fails() {
        assert_invalid("[execution]\norder_reject_prob = 1.2\n", "order_reject_prob");
    }

    #[test]
    fn negative_spread_fails() {
        assert_invalid("[execution]\nspread_bps = -1\n", "spread_bps");
    }

    #[test]
    fn bad_seed_fails() {
        assert_invalid("[execution]\nseed = abc\n", "seed");
    }

    #[test]
    fn unknown_sizing_fails() {
        assert_invalid("[execution]\nsizing = kelly\n", "sizing");
    }

    #[test]
    fn bad_month_fails() {
        assert_invalid("[filter]\nstart_month = 13\n", "start_month");
    }

    #[test]
    fn zero_period_fails() {
        assert_invalid("[strategy]\nstoch_period = 0\n", "stoch_period");
    }

    #[test]
    fn macd_fast_must_be_below_slow() {
        assert_invalid("[strategy]\nmacd_fast = 30\nmacd_slow = 26\n", "macd_fast");
    }

    #[test]
    fn empty_sweep_list_fails() {
        assert_invalid("[sweep]\nsma_period_range = ,\n", "sma_period_range");
    }

    #[test]
    fn bad_sweep_item_fails() {
        assert_invalid("[sweep]\nuse_signal_options = true,maybe\n", "use_signal_options");
    }

    #[test]
    fn malformed_numbers_are_reported() {
        assert_invalid("[account]\nrisk_fraction = 0.5x\n", "risk_fraction");
        assert_invalid("[execution]\norder_reject_prob = one\n", "order_reject_prob");
        assert_invalid("[market]\nagg_minutes = three\n", "agg_minutes");
        assert_invalid("[execution]\nmax_fill_latency_ms = -5\n", "max_fill_latency_ms");
    }

    #[test]
    fn malformed_flag_is_reported() {
        assert_invalid("[strategy]\nuse_macd = maybe\n", "use_macd");
        assert_invalid("[sweep]\nparallel = sometimes\n", "parallel");
    }

    #[test]
    fn huge_poll_interval_is_out_of_range() {
        assert_invalid("[live]\npoll_interval_secs = 1e30\n", "poll_interval_secs");
        assert_invalid("[live]\npoll_interval_secs = -1\n", "poll_interval_secs");
    }

    #[test]
    fn replay_window_must_exceed_warmup() {
        let mut cfg = TraderConfig::default();
        let params = StrategyParams {
            sma_period: 2,
            stoch_period: 2,
            macd_fast: 1,
            macd_slow: 2,
            macd_signal: 1,
            ..Default::default()
        };
        assert_eq!(params.warmup(), 4);

        cfg.live.history_bars = 4;
        match validate_replay_window(&cfg, &params) {
            Err(ShortTraderError::ConfigInvalid { key, .. }) => assert_eq!(key, "history_bars"),
            other => panic!("expected invalid history_bars, got {other:?}"),
        }

        cfg.live.history_bars = 5;
        assert!(validate_replay_window(&cfg, &params).is_ok());
    }

    #[test]
    fn tiers_parse_and_reject_garbage() {
        let tiers = parse_tiers("50000:50, 200000:25,500000:10").unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[1].notional_threshold, 200_000.0);
        assert_eq!(tiers[1].max_leverage, 25.0);
        assert!(parse_tiers("50000-50").is_err());
        assert_invalid("[leverage]\ntiers = 50000:0\n", "tiers");
    }
}
