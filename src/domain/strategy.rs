//! Hedge grid strategy.
//!
//! The grid is anchored at a reference close once ATR is available. Spacing is
//! widened by volatility at anchoring time and then frozen:
//!
//! ```text
//! s        = grid_spacing * (1 + atr_multiplier * ATR / reference)
//! buy[k]   = reference * (1 - k * s)    k = 1..=grid_levels
//! sell[k]  = reference * (1 + k * s)
//! ```
//!
//! A buy level fires when the previous close sat above it and the current bar
//! traded down to it; sell levels mirror that. Each firing becomes a limit
//! order at the level price. `decide` is a pure function: the anchor is passed
//! in and the possibly re-anchored grid is handed back in the [`Decision`].

use serde::{Deserialize, Serialize};

use super::error::HedgeGridError;
use super::indicator::IndicatorState;
use super::order::{IdGen, Order, Side};
use super::position::QTY_EPSILON;
use super::risk::RiskState;

/// Relative tolerance when comparing the previous close against a level.
const LEVEL_EPSILON: f64 = 1e-9;

/// Upper bounds on the integer knobs. Every level is scanned on every bar.
pub const MAX_GRID_LEVELS: usize = 1_000;
pub const MAX_ATR_PERIOD: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeGridParams {
    pub symbol: String,
    pub grid_spacing: f64,
    pub grid_levels: usize,
    pub order_size: f64,
    pub max_position: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub risk_per_trade: f64,
    pub max_drawdown: f64,
}

impl Default for HedgeGridParams {
    fn default() -> Self {
        HedgeGridParams {
            symbol: "ETHUSDT".to_string(),
            grid_spacing: 0.01,
            grid_levels: 10,
            order_size: 0.1,
            max_position: 1.0,
            atr_period: 14,
            atr_multiplier: 2.0,
            risk_per_trade: 0.02,
            max_drawdown: 0.2,
        }
    }
}

impl HedgeGridParams {
    pub fn validate(&self) -> Result<(), HedgeGridError> {
        if self.symbol.trim().is_empty() {
            return Err(HedgeGridError::invalid("strategy", "symbol", "symbol must not be empty"));
        }
        fraction("grid_spacing", self.grid_spacing)?;
        count("grid_levels", self.grid_levels, MAX_GRID_LEVELS)?;
        positive("order_size", self.order_size)?;
        positive("max_position", self.max_position)?;
        count("atr_period", self.atr_period, MAX_ATR_PERIOD)?;
        positive("atr_multiplier", self.atr_multiplier)?;
        fraction("risk_per_trade", self.risk_per_trade)?;
        fraction("max_drawdown", self.max_drawdown)?;
        Ok(())
    }
}

fn count(key: &str, value: usize, max: usize) -> Result<(), HedgeGridError> {
    if !(1..=max).contains(&value) {
        return Err(HedgeGridError::invalid(
            "strategy",
            key,
            format!("{key} must be in [1, {max}]"),
        ));
    }
    Ok(())
}

fn positive(key: &str, value: f64) -> Result<(), HedgeGridError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(HedgeGridError::invalid("strategy", key, format!("{key} must be positive")));
    }
    Ok(())
}

fn fraction(key: &str, value: f64) -> Result<(), HedgeGridError> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(HedgeGridError::invalid(
            "strategy",
            key,
            format!("{key} must be in (0, 1]"),
        ));
    }
    Ok(())
}

/// A grid frozen at a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAnchor {
    pub reference: f64,
    /// Effective fractional spacing between adjacent levels.
    pub spacing: f64,
    pub levels: usize,
}

impl GridAnchor {
    pub fn new(reference: f64, spacing: f64, levels: usize) -> Self {
        GridAnchor {
            reference,
            spacing,
            levels,
        }
    }

    /// Anchor at the current close; `None` while ATR is warming up.
    pub fn from_state(state: &IndicatorState, params: &HedgeGridParams) -> Option<Self> {
        let normalized_atr = state.normalized_atr(state.close)?;
        let spacing = params.grid_spacing * (1.0 + params.atr_multiplier * normalized_atr);
        Some(GridAnchor::new(state.close, spacing, params.grid_levels))
    }

    pub fn buy_level(&self, k: usize) -> f64 {
        self.reference * (1.0 - k as f64 * self.spacing)
    }

    pub fn sell_level(&self, k: usize) -> f64 {
        self.reference * (1.0 + k as f64 * self.spacing)
    }

    /// Stop for long entries: one spacing below the outermost buy level.
    pub fn buy_stop(&self) -> f64 {
        self.buy_level(self.levels + 1)
    }

    /// Stop for short entries: one spacing above the outermost sell level.
    pub fn sell_stop(&self) -> f64 {
        self.sell_level(self.levels + 1)
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.buy_level(self.levels) && price <= self.sell_level(self.levels)
    }
}

/// Account state the strategy may look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyContext {
    pub position: f64,
    pub equity: f64,
    pub risk_state: RiskState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub orders: Vec<Order>,
    pub anchor: Option<GridAnchor>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    level: usize,
    side: Side,
    price: f64,
}

/// Map the current bar's market state to the bar's orders.
///
/// Ordering is deterministic: candidates are sorted by level index (which is
/// distance from the reference) and then buy before sell.
pub fn decide(
    state: &IndicatorState,
    anchor: Option<GridAnchor>,
    ctx: &StrategyContext,
    params: &HedgeGridParams,
    ids: &mut IdGen,
) -> Decision {
    if ctx.risk_state == RiskState::Halted {
        return Decision {
            orders: flatten(state, ctx, ids),
            anchor,
        };
    }

    if !state.is_warm() {
        return Decision {
            orders: Vec::new(),
            anchor,
        };
    }

    let flat = ctx.position.abs() <= QTY_EPSILON;
    let grid = match anchor {
        Some(grid) if !flat || grid.contains(state.close) => grid,
        // fresh levels are at least one spacing from this close, nothing can fire yet
        _ => {
            return Decision {
                orders: Vec::new(),
                anchor: GridAnchor::from_state(state, params),
            };
        }
    };

    let Some(prev_close) = state.prev_close else {
        return Decision {
            orders: Vec::new(),
            anchor: Some(grid),
        };
    };

    let mut candidates = crossed_levels(&grid, prev_close, state.low, state.high);
    candidates.sort_by(|a, b| a.level.cmp(&b.level).then(a.side.cmp(&b.side)));

    let mut projected = ctx.position;
    let mut orders = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let sized = risk_capped_size(&grid, &candidate, ctx.equity, params);
        let quantity = exposure_capped(projected, candidate.side, sized, params.max_position);
        if quantity <= QTY_EPSILON {
            continue;
        }
        projected += candidate.side.sign() * quantity;
        orders.push(Order::limit(
            ids.next_id(),
            candidate.side,
            quantity,
            candidate.price,
            state.timestamp,
        ));
    }

    Decision {
        orders,
        anchor: Some(grid),
    }
}

fn flatten(state: &IndicatorState, ctx: &StrategyContext, ids: &mut IdGen) -> Vec<Order> {
    if ctx.position.abs() <= QTY_EPSILON {
        return Vec::new();
    }
    let side = if ctx.position > 0.0 { Side::Sell } else { Side::Buy };
    vec![Order::market(
        ids.next_id(),
        side,
        ctx.position.abs(),
        state.timestamp,
    )]
}

fn crossed_levels(grid: &GridAnchor, prev_close: f64, low: f64, high: f64) -> Vec<Candidate> {
    let mut crossed = Vec::new();
    for k in 1..=grid.levels {
        let buy = grid.buy_level(k);
        if buy > 0.0 && prev_close > buy * (1.0 + LEVEL_EPSILON) && low <= buy {
            crossed.push(Candidate {
                level: k,
                side: Side::Buy,
                price: buy,
            });
        }
        let sell = grid.sell_level(k);
        if prev_close < sell * (1.0 - LEVEL_EPSILON) && high >= sell {
            crossed.push(Candidate {
                level: k,
                side: Side::Sell,
                price: sell,
            });
        }
    }
    crossed
}

/// min(order_size, risk_per_trade * equity / distance_to_stop)
fn risk_capped_size(
    grid: &GridAnchor,
    candidate: &Candidate,
    equity: f64,
    params: &HedgeGridParams,
) -> f64 {
    if equity <= 0.0 {
        return 0.0;
    }
    let stop = match candidate.side {
        Side::Buy => grid.buy_stop(),
        Side::Sell => grid.sell_stop(),
    };
    let distance = (candidate.price - stop).abs();
    if distance <= 0.0 {
        return params.order_size;
    }
    params
        .order_size
        .min(params.risk_per_trade * equity / distance)
}

/// Largest part of `quantity` that keeps |position| within `max_position`.
fn exposure_capped(position: f64, side: Side, quantity: f64, max_position: f64) -> f64 {
    let room = match side {
        Side::Buy => max_position - position,
        Side::Sell => max_position + position,
    };
    quantity.min(room).max(0.0)
}
