//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_params_store::JsonParamsStore;
use crate::adapters::replay_feed::ReplayFeed;
use crate::domain::backtest::{run_backtest, TraderConfig};
use crate::domain::config_validation::{build_trader_config, validate_replay_window};
use crate::domain::document::{summarize, BestParamsDocument};
use crate::domain::error::ShortTraderError;
use crate::domain::live::LiveEngine;
use crate::domain::metrics::BacktestMetrics;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::TradeRecord;
use crate::domain::strategy::StrategyParams;
use crate::domain::sweep::run_search;
use crate::ports::data_port::DataPort;
use crate::ports::params_store::ParamsStore;

#[derive(Parser, Debug)]
#[command(name = "shorttrader", about = "Short-only strategy backtester, optimizer and replay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Grid-search the sweep ranges and save the best parameters
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long, default_value = "best_params.json")]
        output: PathBuf,
    },
    /// Run one backtest with the configured or saved parameters
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        params: Option<PathBuf>,
    },
    /// Replay recorded bars through the live engine
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        params: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Optimize {
            config,
            data,
            output,
        } => run_optimize(&config, &data, &output),
        Command::Backtest {
            config,
            data,
            params,
        } => run_single(&config, &data, params.as_deref()),
        Command::Replay {
            config,
            data,
            params,
        } => run_replay(&config, &data, &params),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<TraderConfig, ShortTraderError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    build_trader_config(&adapter)
}

fn log_config(config: &TraderConfig) {
    info!(
        symbol = %config.symbol,
        category = %config.category,
        agg_minutes = config.agg_minutes,
        balance = config.starting_balance,
        fee_rate = config.orders.fee_rate,
        spread_bps = config.fill.spread_bps,
        slippage_bps = config.fill.slippage_bps,
        risk_fraction = config.orders.risk_fraction,
        margin_rate = config.orders.margin_rate,
        start = %format!("{}-{:02}", config.rules.start_year, config.rules.start_month),
        "configuration"
    );
}

/// Loads bars and checks there are more than `warmup` of them.
fn load_bars(data: &Path, config: &TraderConfig, warmup: usize) -> Result<Vec<OhlcvBar>, ShortTraderError> {
    let bars = CsvAdapter::new(data.to_path_buf()).fetch_bars(&config.symbol, config.agg_minutes)?;
    if bars.len() <= warmup {
        return Err(ShortTraderError::InsufficientData {
            symbol: config.symbol.clone(),
            bars: bars.len(),
            minimum: warmup + 1,
        });
    }
    info!(bars = bars.len(), from = %bars[0].timestamp, "bars loaded");
    Ok(bars)
}

fn run_optimize(config_path: &Path, data: &Path, output: &Path) -> Result<(), ShortTraderError> {
    // Stage 1: config and data
    let config = load_config(config_path)?;
    log_config(&config);
    let min_warmup = config
        .sweep
        .combinations(&config.strategy)
        .iter()
        .map(StrategyParams::warmup)
        .min()
        .unwrap_or(0);
    let bars = load_bars(data, &config, min_warmup)?;

    // Stage 2: search
    let outcome = run_search(&bars, &config);
    let best = outcome.best_row().ok_or_else(|| ShortTraderError::Data {
        reason: "parameter search produced no rows".to_string(),
    })?;

    // Stage 3: report
    println!("\n=== Best Parameters ({}m) ===", config.agg_minutes);
    print_params(&best.params);
    print_metrics(&best.metrics);
    print_summary(&best.metrics);
    print_trades(&outcome.best_trades);

    // Stage 4: persist
    let document = BestParamsDocument::new(&config, best.params, &best.metrics);
    JsonParamsStore::new(output.to_path_buf()).save(&document)?;
    println!("\nSaved best parameters to {}", output.display());
    Ok(())
}

fn run_single(config_path: &Path, data: &Path, params_path: Option<&Path>) -> Result<(), ShortTraderError> {
    let config = load_config(config_path)?;
    log_config(&config);

    let params = match params_path {
        Some(path) => JsonParamsStore::new(path.to_path_buf()).load()?.params,
        None => config.strategy,
    };
    let bars = load_bars(data, &config, params.warmup())?;

    let report = run_backtest(&bars, &params, &config, &mut config.fill_model(0));

    println!("\n=== Backtest ===");
    print_params(&params);
    print_metrics(&report.metrics);
    print_summary(&report.metrics);
    print_trades(&report.trades);
    Ok(())
}

fn run_replay(config_path: &Path, data: &Path, params_path: &Path) -> Result<(), ShortTraderError> {
    let config = load_config(config_path)?;
    log_config(&config);

    let document = JsonParamsStore::new(params_path.to_path_buf()).load()?;
    if document.symbol != config.symbol || document.agg_minutes != config.agg_minutes {
        warn!(
            saved_symbol = %document.symbol,
            saved_agg = document.agg_minutes,
            "saved parameters were optimized for a different market"
        );
    }
    let params = document.params;
    validate_replay_window(&config, &params)?;
    let warmup = params.warmup();
    let bars = load_bars(data, &config, warmup)?;

    let mut feed = ReplayFeed::new(bars, config.live.history_bars, warmup);
    let mut engine = LiveEngine::from_config(&config, params);
    engine.run(&mut feed)?;

    let state = engine.state();
    println!("\n=== Replay ===");
    print_params(&params);
    println!("Polls:            {}", engine.polls());
    println!("Bars processed:   {}", state.equity_curve.len());
    println!("Equity:           {:.2}", state.equity());
    if let (Some(pos), Some(last)) = (&state.position, state.equity_curve.last()) {
        println!(
            "Open position:    {} qty={:.4} entry={:.6} tp={:.6} liq={:.6} since {} (as of {})",
            pos.side, pos.qty, pos.entry_price, pos.tp_price, pos.liq_price, pos.entry_time, last.timestamp
        );
    }
    print_trades(&state.closed_trades);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ShortTraderError> {
    let config = load_config(config_path)?;
    println!("Configuration is valid");
    println!("  market:   {} ({}) {}m", config.symbol, config.category, config.agg_minutes);
    println!("  balance:  {:.2}", config.starting_balance);
    println!(
        "  sweep:    {} combinations{}",
        config.sweep.size(),
        if config.sweep.parallel { " (parallel)" } else { "" }
    );
    println!(
        "  seed:     {}",
        config
            .seed
            .map_or_else(|| "entropy".to_string(), |s| s.to_string())
    );
    Ok(())
}

fn print_params(params: &StrategyParams) {
    println!(
        "sma={} stoch={} macd={}/{}/{} use_macd={} use_signal={} use_momentum_exit={}",
        params.sma_period,
        params.stoch_period,
        params.macd_fast,
        params.macd_slow,
        params.macd_signal,
        params.use_macd,
        params.use_signal,
        params.use_momentum_exit,
    );
}

fn print_metrics(metrics: &BacktestMetrics) {
    println!("PnL:              {:.2}%  ({:.2})", metrics.pnl_pct, metrics.pnl_value);
    println!("Sharpe Ratio:     {:.2}", metrics.sharpe);
    println!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    match metrics.rr_ratio {
        Some(rr) => println!("Reward/Risk:      {:.2}", rr),
        None => println!("Reward/Risk:      n/a"),
    }
}

fn print_summary(metrics: &BacktestMetrics) {
    let s = summarize(metrics);
    println!("\n=== Results ===");
    println!("Total Trades:     {}", s.total_trades);
    println!("Wins:             {}", s.wins);
    println!("Losses:           {}", s.losses);
    println!("Win Rate %:       {}", s.win_rate_pct);
    println!("Total PnL:        {}", s.total_pnl);
    println!("Final Balance:    {}", s.final_balance);
    println!("Average Win:      {}", s.average_win);
    println!("Average Loss:     {}", s.average_loss);
}

fn print_trades(trades: &[TradeRecord]) {
    if trades.is_empty() {
        return;
    }
    println!("\n=== Trades ===");
    println!(
        "{:<20} {:<20} {:>14} {:>14} {:>12} {:>9} {:>12} {}",
        "entry_time", "exit_time", "entry_price", "exit_price", "pnl_value", "pnl_pct", "qty", "exit_type"
    );
    for t in trades {
        println!(
            "{:<20} {:<20} {:>14.6} {:>14.6} {:>12.4} {:>9.4} {:>12.4} {}",
            t.entry_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            t.exit_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            t.entry_price,
            t.exit_price,
            t.pnl_value,
            t.pnl_pct,
            t.qty,
            t.exit_type,
        );
    }
}
