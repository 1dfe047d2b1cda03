//! Core domain types and logic.

pub mod backtest;
pub mod candle;
pub mod candle_buffer;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod pipeline;
pub mod price_action;
pub mod scorer;
pub mod signal;
pub mod snapshot;
