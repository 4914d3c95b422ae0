//! Position tracking with weighted-average cost basis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::Trade;

/// Quantities closer to zero than this are treated as flat.
pub const QTY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub quantity: f64,
    /// 0 when flat.
    pub average_price: f64,
    pub unrealized_pnl: f64,
    pub timestamp: DateTime<Utc>,
}

/// Effect of a single fill on the position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub snapshot: PositionSnapshot,
    pub realized_pnl: f64,
    pub closed_quantity: f64,
}

#[derive(Debug, Clone)]
pub struct PositionTracker {
    symbol: String,
    quantity: f64,
    average_price: f64,
    realized_pnl: f64,
    fees_paid: f64,
}

impl PositionTracker {
    pub fn new(symbol: impl Into<String>) -> Self {
        PositionTracker {
            symbol: symbol.into(),
            quantity: 0.0,
            average_price: 0.0,
            realized_pnl: 0.0,
            fees_paid: 0.0,
        }
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn average_price(&self) -> f64 {
        self.average_price
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    /// (mark - average_price) * quantity
    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        if self.is_flat() {
            return 0.0;
        }
        (mark - self.average_price) * self.quantity
    }

    /// Apply a fill and return the resulting position marked at `mark`.
    ///
    /// Additions move the average price (weighted-average cost). Reductions
    /// release cost basis proportionally and realize P&L at the fill price.
    /// A fill that crosses through zero first closes the old position in full,
    /// then opens the remainder at the fill price.
    pub fn apply(&mut self, trade: &Trade, mark: f64) -> PositionUpdate {
        let signed = trade.side.sign() * trade.quantity;
        let mut realized = 0.0;
        let mut closed = 0.0;

        if self.is_flat() || self.quantity.signum() == signed.signum() {
            let new_qty = self.quantity + signed;
            self.average_price = (self.average_price * self.quantity.abs()
                + trade.price * signed.abs())
                / new_qty.abs();
            self.quantity = new_qty;
        } else {
            closed = signed.abs().min(self.quantity.abs());
            realized = (trade.price - self.average_price) * closed * self.quantity.signum();
            let remainder = signed.abs() - closed;

            if remainder > QTY_EPSILON {
                // reversal: old side fully closed, new basis at the fill price
                self.quantity = signed.signum() * remainder;
                self.average_price = trade.price;
            } else {
                self.quantity += signed;
                if self.quantity.abs() <= QTY_EPSILON {
                    self.quantity = 0.0;
                    self.average_price = 0.0;
                }
            }
        }

        self.realized_pnl += realized;
        self.fees_paid += trade.fee;

        PositionUpdate {
            snapshot: self.snapshot(trade.timestamp, mark),
            realized_pnl: realized,
            closed_quantity: closed,
        }
    }

    pub fn snapshot(&self, timestamp: DateTime<Utc>, mark: f64) -> PositionSnapshot {
        PositionSnapshot {
            symbol: self.symbol.clone(),
            quantity: self.quantity,
            average_price: self.average_price,
            unrealized_pnl: self.unrealized_pnl(mark),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::Side;
    use approx::assert_relative_eq;

    fn trade(side: Side, quantity: f64, price: f64) -> Trade {
        Trade {
            id: 1,
            order_id: 1,
            side,
            quantity,
            price,
            fee: 0.0,
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            realized_pnl: 0.0,
            closed_quantity: 0.0,
        }
    }

    #[test]
    fn new_tracker_is_flat() {
        let tracker = PositionTracker::new("ETHUSDT");
        assert!(tracker.is_flat());
        assert_eq!(tracker.average_price(), 0.0);
        assert_eq!(tracker.unrealized_pnl(2000.0), 0.0);
    }

    #[test]
    fn open_long_sets_basis() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        let update = tracker.apply(&trade(Side::Buy, 1.0, 100.0), 100.0);
        assert!(tracker.is_long());
        assert_eq!(update.snapshot.quantity, 1.0);
        assert_eq!(update.snapshot.average_price, 100.0);
        assert_eq!(update.realized_pnl, 0.0);
        assert_eq!(update.closed_quantity, 0.0);
    }

    #[test]
    fn add_to_long_weights_average() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        tracker.apply(&trade(Side::Buy, 1.0, 100.0), 100.0);
        tracker.apply(&trade(Side::Buy, 3.0, 120.0), 120.0);
        assert_relative_eq!(tracker.quantity(), 4.0);
        assert_relative_eq!(tracker.average_price(), (100.0 + 360.0) / 4.0);
    }

    #[test]
    fn partial_close_realizes_proportionally() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        tracker.apply(&trade(Side::Buy, 2.0, 100.0), 100.0);
        let update = tracker.apply(&trade(Side::Sell, 0.5, 110.0), 110.0);
        assert_relative_eq!(update.realized_pnl, 5.0);
        assert_relative_eq!(update.closed_quantity, 0.5);
        assert_relative_eq!(tracker.quantity(), 1.5);
        // basis unchanged on reductions
        assert_relative_eq!(tracker.average_price(), 100.0);
    }

    #[test]
    fn full_close_resets_average_price() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        tracker.apply(&trade(Side::Buy, 1.0, 100.0), 100.0);
        let update = tracker.apply(&trade(Side::Sell, 1.0, 90.0), 90.0);
        assert_relative_eq!(update.realized_pnl, -10.0);
        assert!(tracker.is_flat());
        assert_eq!(update.snapshot.average_price, 0.0);
        assert_eq!(update.snapshot.unrealized_pnl, 0.0);
    }

    #[test]
    fn short_profit_on_cover() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        tracker.apply(&trade(Side::Sell, 2.0, 100.0), 100.0);
        assert!(tracker.is_short());
        assert_relative_eq!(tracker.unrealized_pnl(90.0), 20.0);
        let update = tracker.apply(&trade(Side::Buy, 2.0, 90.0), 90.0);
        assert_relative_eq!(update.realized_pnl, 20.0);
        assert!(tracker.is_flat());
    }

    #[test]
    fn reversal_splits_close_and_reopen() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        tracker.apply(&trade(Side::Buy, 1.0, 100.0), 100.0);
        let update = tracker.apply(&trade(Side::Sell, 3.0, 110.0), 110.0);

        // closes 1 long at +10, opens 2 short at 110
        assert_relative_eq!(update.realized_pnl, 10.0);
        assert_relative_eq!(update.closed_quantity, 1.0);
        assert_relative_eq!(tracker.quantity(), -2.0);
        assert_relative_eq!(tracker.average_price(), 110.0);
        assert_relative_eq!(update.snapshot.unrealized_pnl, 0.0);
    }

    #[test]
    fn unrealized_uses_mark() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        let update = tracker.apply(&trade(Side::Buy, 0.5, 2000.0), 1980.0);
        assert_relative_eq!(update.snapshot.unrealized_pnl, -10.0);
    }

    #[test]
    fn fees_accumulate() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        let mut t = trade(Side::Buy, 1.0, 100.0);
        t.fee = 0.05;
        tracker.apply(&t, 100.0);
        tracker.apply(&t, 100.0);
        assert_relative_eq!(tracker.fees_paid(), 0.1);
    }

    #[test]
    fn float_dust_snaps_to_flat() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        tracker.apply(&trade(Side::Buy, 0.1, 100.0), 100.0);
        tracker.apply(&trade(Side::Buy, 0.2, 100.0), 100.0);
        tracker.apply(&trade(Side::Sell, 0.3, 100.0), 100.0);
        assert!(tracker.is_flat());
    }
}
