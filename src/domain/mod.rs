//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod leverage;
pub mod order_engine;
pub mod indicator;
pub mod indicator_helpers;
pub mod strategy;
pub mod state_machine;
pub mod backtest;
pub mod metrics;
pub mod sweep;
pub mod live;
pub mod document;
pub mod config_validation;
pub mod error;
