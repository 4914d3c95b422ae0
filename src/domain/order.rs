//! Orders issued by the strategy and the trades they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::HedgeGridError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    /// Required for limit orders, ignored for market orders.
    pub price: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn market(id: u64, side: Side, quantity: f64, timestamp: DateTime<Utc>) -> Self {
        Order {
            id,
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            timestamp,
        }
    }

    pub fn limit(id: u64, side: Side, quantity: f64, price: f64, timestamp: DateTime<Utc>) -> Self {
        Order {
            id,
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            timestamp,
        }
    }

    pub fn validate(&self) -> Result<(), HedgeGridError> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(self.rejected("quantity must be positive"));
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => Err(self.rejected("limit order without price")),
            (OrderType::Limit, Some(p)) if !p.is_finite() || p <= 0.0 => {
                Err(self.rejected("limit price must be positive"))
            }
            _ => Ok(()),
        }
    }

    fn rejected(&self, reason: &str) -> HedgeGridError {
        HedgeGridError::OrderRejected {
            order_id: self.id,
            reason: reason.to_string(),
        }
    }
}

/// A realized fill of an [`Order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub order_id: u64,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub timestamp: DateTime<Utc>,
    /// Gross P&L released by the part of this fill that reduced a position.
    pub realized_pnl: f64,
    /// Quantity of this fill that closed existing exposure.
    pub closed_quantity: f64,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }

    pub fn is_closing(&self) -> bool {
        self.closed_quantity > 0.0
    }

    /// Realized P&L net of this fill's fee.
    pub fn net_pnl(&self) -> f64 {
        self.realized_pnl - self.fee
    }
}

/// Monotonic id source, one per run.
#[derive(Debug, Clone)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn new() -> Self {
        IdGen { next: 1 }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn side_sign() {
        assert_eq!(Side::Buy.sign(), 1.0);
        assert_eq!(Side::Sell.sign(), -1.0);
    }

    #[test]
    fn buy_sorts_before_sell() {
        assert!(Side::Buy < Side::Sell);
    }

    #[test]
    fn market_order_is_valid() {
        let order = Order::market(1, Side::Buy, 0.1, ts());
        assert!(order.validate().is_ok());
    }

    #[test]
    fn zero_quantity_rejected() {
        let order = Order::market(2, Side::Sell, 0.0, ts());
        let err = order.validate().unwrap_err();
        assert!(matches!(err, HedgeGridError::OrderRejected { order_id: 2, .. }));
    }

    #[test]
    fn negative_quantity_rejected() {
        assert!(Order::market(3, Side::Buy, -1.0, ts()).validate().is_err());
    }

    #[test]
    fn limit_without_price_rejected() {
        let mut order = Order::limit(4, Side::Buy, 1.0, 100.0, ts());
        order.price = None;
        assert!(order.validate().is_err());
    }

    #[test]
    fn limit_with_negative_price_rejected() {
        assert!(Order::limit(5, Side::Buy, 1.0, -5.0, ts()).validate().is_err());
    }

    #[test]
    fn ids_are_sequential() {
        let mut ids = IdGen::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
    }

    #[test]
    fn side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"buy\"");
        assert_eq!(serde_json::to_string(&OrderType::Limit).unwrap(), "\"limit\"");
    }
}
