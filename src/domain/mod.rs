//! Core domain types and logic: indicators, signals, the trade simulator,
//! metrics and the orchestrator that sequences them.

pub mod annotate;
pub mod anomaly;
pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod narrative;
pub mod ohlcv;
pub mod predicate;
pub mod report;
pub mod rule;
pub mod rule_eval;
pub mod rule_parser;
pub mod settings;
pub mod signal;
pub mod simulator;
pub mod strategy;
pub mod templates;
