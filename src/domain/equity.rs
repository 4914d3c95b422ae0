//! Per-bar equity snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::PositionTracker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub ts: DateTime<Utc>,
    pub equity: f64,
    pub cash: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
}

/// Margin-style account: cash is the initial balance plus realized P&L minus
/// fees; open positions contribute only their unrealized P&L.
#[derive(Debug, Clone)]
pub struct EquityRecorder {
    initial_equity: f64,
    snapshots: Vec<EquitySnapshot>,
}

impl EquityRecorder {
    pub fn new(initial_equity: f64) -> Self {
        EquityRecorder {
            initial_equity,
            snapshots: Vec::new(),
        }
    }

    pub fn cash(&self, position: &PositionTracker) -> f64 {
        self.initial_equity + position.realized_pnl() - position.fees_paid()
    }

    /// Equity marked at `mark` without recording anything.
    pub fn mark(&self, position: &PositionTracker, mark: f64) -> f64 {
        self.cash(position) + position.unrealized_pnl(mark)
    }

    pub fn snapshot(
        &mut self,
        ts: DateTime<Utc>,
        cash: f64,
        position: &PositionTracker,
        mark: f64,
    ) -> &EquitySnapshot {
        let unrealized_pnl = position.unrealized_pnl(mark);
        self.snapshots.push(EquitySnapshot {
            ts,
            equity: cash + unrealized_pnl,
            cash,
            unrealized_pnl,
            realized_pnl: position.realized_pnl(),
        });
        &self.snapshots[self.snapshots.len() - 1]
    }

    pub fn snapshots(&self) -> &[EquitySnapshot] {
        &self.snapshots
    }

    pub fn into_snapshots(self) -> Vec<EquitySnapshot> {
        self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Side, Trade};
    use approx::assert_relative_eq;

    fn ts(minute: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(minute * 60, 0).unwrap()
    }

    fn buy(quantity: f64, price: f64, fee: f64) -> Trade {
        Trade {
            id: 1,
            order_id: 1,
            side: Side::Buy,
            quantity,
            price,
            fee,
            timestamp: ts(0),
            realized_pnl: 0.0,
            closed_quantity: 0.0,
        }
    }

    #[test]
    fn flat_account_equity_is_cash() {
        let tracker = PositionTracker::new("ETHUSDT");
        let mut recorder = EquityRecorder::new(10_000.0);
        let cash = recorder.cash(&tracker);
        let snap = recorder.snapshot(ts(0), cash, &tracker, 2000.0).clone();
        assert_eq!(snap.equity, 10_000.0);
        assert_eq!(snap.cash, 10_000.0);
        assert_eq!(snap.unrealized_pnl, 0.0);
    }

    #[test]
    fn fees_reduce_cash() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        tracker.apply(&buy(1.0, 2000.0, 1.0), 2000.0);
        let recorder = EquityRecorder::new(10_000.0);
        assert_relative_eq!(recorder.cash(&tracker), 9_999.0);
    }

    #[test]
    fn equity_reconciles_with_open_position() {
        let mut tracker = PositionTracker::new("ETHUSDT");
        tracker.apply(&buy(0.5, 2000.0, 0.5), 2000.0);
        let mut recorder = EquityRecorder::new(10_000.0);
        let cash = recorder.cash(&tracker);
        let snap = recorder.snapshot(ts(1), cash, &tracker, 2100.0).clone();
        assert_relative_eq!(snap.unrealized_pnl, 50.0);
        assert_eq!(snap.equity, snap.cash + snap.unrealized_pnl);
        assert_relative_eq!(recorder.mark(&tracker, 2100.0), snap.equity);
    }

    #[test]
    fn snapshots_append_in_order() {
        let tracker = PositionTracker::new("ETHUSDT");
        let mut recorder = EquityRecorder::new(100.0);
        for minute in 0..3 {
            let cash = recorder.cash(&tracker);
            recorder.snapshot(ts(minute), cash, &tracker, 1.0);
        }
        let times: Vec<_> = recorder.snapshots().iter().map(|s| s.ts).collect();
        assert_eq!(times, vec![ts(0), ts(1), ts(2)]);
    }
}
