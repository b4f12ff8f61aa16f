//! Core domain types and logic.

pub mod candle;
pub mod pattern;
pub mod backtest;
pub mod config_validation;
pub mod position;
pub mod execution;
pub mod portfolio;
pub mod clock;
pub mod metrics;
pub mod orchestrator;
pub mod indicator;
pub mod alert;
pub mod snapshot;
pub mod alert_eval;
pub mod alert_trigger;
pub mod alert_monitor;
pub mod error;
