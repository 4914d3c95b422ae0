//! Order execution and fill simulation.
//!
//! Market orders fill in full at the bar close moved against the trader by
//! slippage. Limit orders fill at their limit price if the bar traded through
//! it, otherwise they expire with the bar. Fees are charged on every fill.

use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::error::HedgeGridError;
use super::order::{Order, OrderType, Side, Trade};

const BPS: f64 = 10_000.0;

/// Fee and slippage model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub fee_bps: f64,
    pub slippage_bps: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            fee_bps: 5.0,
            slippage_bps: 2.0,
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), HedgeGridError> {
        if !self.fee_bps.is_finite() || self.fee_bps < 0.0 {
            return Err(HedgeGridError::invalid(
                "backtest",
                "fee_bps",
                "fee_bps must be non-negative",
            ));
        }
        if !self.slippage_bps.is_finite() || self.slippage_bps < 0.0 || self.slippage_bps >= BPS {
            return Err(HedgeGridError::invalid(
                "backtest",
                "slippage_bps",
                "slippage_bps must be in [0, 10000)",
            ));
        }
        Ok(())
    }
}

/// Fee: notional * fee_bps / 10000.
pub fn calculate_fee(notional: f64, fee_bps: f64) -> f64 {
    notional * fee_bps / BPS
}

/// Buy pays up: price * (1 + slippage_bps / 10000).
/// Sell receives down: price * (1 - slippage_bps / 10000).
pub fn apply_slippage(price: f64, side: Side, slippage_bps: f64) -> f64 {
    match side {
        Side::Buy => price * (1.0 + slippage_bps / BPS),
        Side::Sell => price * (1.0 - slippage_bps / BPS),
    }
}

/// Whether a limit order would have traded inside this bar.
///
/// A buy limit fills once the bar trades at or below it, a sell limit once the
/// bar trades at or above it. A limit already through the range fills at the
/// limit price as well; no price improvement is modelled.
pub fn limit_crossed(side: Side, limit: f64, bar: &Bar) -> bool {
    match side {
        Side::Buy => bar.low <= limit,
        Side::Sell => bar.high >= limit,
    }
}

/// Simulate one order against one bar.
///
/// Returns `Ok(None)` when a limit order is not reached (it expires at bar
/// end) and `Err(OrderRejected)` for malformed orders.
pub fn fill(
    order: &Order,
    bar: &Bar,
    config: &ExecutionConfig,
    trade_id: u64,
) -> Result<Option<Trade>, HedgeGridError> {
    order.validate()?;
    if order.timestamp > bar.timestamp {
        return Err(HedgeGridError::OrderRejected {
            order_id: order.id,
            reason: "order issued after the bar it would fill on".to_string(),
        });
    }

    let price = match (order.order_type, order.price) {
        (OrderType::Market, _) => apply_slippage(bar.close, order.side, config.slippage_bps),
        (OrderType::Limit, Some(limit)) => {
            if !limit_crossed(order.side, limit, bar) {
                return Ok(None);
            }
            limit
        }
        // validate() already rejects a limit without a price
        (OrderType::Limit, None) => return Ok(None),
    };

    let notional = order.quantity * price;
    let fee = calculate_fee(notional, config.fee_bps);

    Ok(Some(Trade {
        id: trade_id,
        order_id: order.id,
        side: order.side,
        quantity: order.quantity,
        price,
        fee,
        timestamp: bar.timestamp,
        realized_pnl: 0.0,
        closed_quantity: 0.0,
    }))
}
