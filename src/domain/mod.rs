//! Core domain types and logic.

pub mod analysis;
pub mod backtest;
pub mod candle;
pub mod config;
pub mod config_validation;
pub mod cycle;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod order;
pub mod rate_limit;
pub mod selector;
pub mod signal;
pub mod strategy;
pub mod universe;
