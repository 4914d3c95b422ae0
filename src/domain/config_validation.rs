//! Configuration loading and validation.
//!
//! Every key is optional and falls back to its default, but a key that is
//! present must parse and be in range. All of this happens before a single bar
//! is read.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::HedgeGridError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::strategy::HedgeGridParams;
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), HedgeGridError> {
    build_backtest_config(config).map(|_| ())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), HedgeGridError> {
    build_params(config).map(|_| ())
}

/// `[backtest]` section.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, HedgeGridError> {
    let defaults = BacktestConfig::default();
    let months = read_int(
        config,
        "backtest",
        "default_end_months_back",
        i64::from(defaults.default_end_months_back),
    )?;
    let default_end_months_back = u32::try_from(months).map_err(|_| {
        HedgeGridError::invalid(
            "backtest",
            "default_end_months_back",
            "default_end_months_back must be at least 1",
        )
    })?;

    let built = BacktestConfig {
        initial_equity: read_double(config, "backtest", "initial_equity", defaults.initial_equity)?,
        execution: ExecutionConfig {
            fee_bps: read_double(config, "backtest", "fee_bps", defaults.execution.fee_bps)?,
            slippage_bps: read_double(
                config,
                "backtest",
                "slippage_bps",
                defaults.execution.slippage_bps,
            )?,
        },
        default_end_months_back,
        bars_per_year: read_double(config, "backtest", "bars_per_year", defaults.bars_per_year)?,
    };
    built.validate()?;
    Ok(built)
}

/// `[strategy]` section.
pub fn build_params(config: &dyn ConfigPort) -> Result<HedgeGridParams, HedgeGridError> {
    let defaults = HedgeGridParams::default();
    let symbol = config
        .get_string("strategy", "symbol")
        .map(|s| s.trim().to_string())
        .unwrap_or(defaults.symbol);

    let built = HedgeGridParams {
        symbol,
        grid_spacing: read_double(config, "strategy", "grid_spacing", defaults.grid_spacing)?,
        grid_levels: read_count(config, "strategy", "grid_levels", defaults.grid_levels)?,
        order_size: read_double(config, "strategy", "order_size", defaults.order_size)?,
        max_position: read_double(config, "strategy", "max_position", defaults.max_position)?,
        atr_period: read_count(config, "strategy", "atr_period", defaults.atr_period)?,
        atr_multiplier: read_double(
            config,
            "strategy",
            "atr_multiplier",
            defaults.atr_multiplier,
        )?,
        risk_per_trade: read_double(
            config,
            "strategy",
            "risk_per_trade",
            defaults.risk_per_trade,
        )?,
        max_drawdown: read_double(config, "strategy", "max_drawdown", defaults.max_drawdown)?,
    };
    built.validate()?;
    Ok(built)
}

fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, HedgeGridError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            HedgeGridError::invalid(section, key, format!("{key} must be a number, got {raw:?}"))
        }),
    }
}

fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, HedgeGridError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            HedgeGridError::invalid(section, key, format!("{key} must be an integer, got {raw:?}"))
        }),
    }
}

fn read_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, HedgeGridError> {
    let value = read_int(config, section, key, default as i64)?;
    usize::try_from(value)
        .map_err(|_| HedgeGridError::invalid(section, key, format!("{key} must be at least 1")))
}
