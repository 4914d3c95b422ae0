//! Core domain types and logic.

pub mod bar;
pub mod indicator;
pub mod order;
pub mod strategy;
pub mod execution;
pub mod position;
pub mod risk;
pub mod equity;
pub mod metrics;
pub mod backtest;
pub mod sweep;
pub mod config_validation;
pub mod error;
