//! Performance metrics and statistics.
//!
//! Everything here is a pure function of the recorded equity snapshots and
//! trades.

use std::collections::BTreeMap;

use super::equity::EquitySnapshot;
use super::order::Trade;

/// Minute bars on a market that trades around the clock.
pub const MINUTE_BARS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub bars: usize,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub total_trades: usize,
    pub closing_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub avg_trade_pnl: f64,
    /// `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    pub realized_pnl: f64,
    pub total_fees: f64,
}

impl Metrics {
    pub fn compute(
        equity: &[EquitySnapshot],
        trades: &[Trade],
        initial_equity: f64,
        bars_per_year: f64,
    ) -> Self {
        let final_equity = equity.last().map(|s| s.equity).unwrap_or(initial_equity);

        let total_return = if initial_equity > 0.0 {
            (final_equity - initial_equity) / initial_equity
        } else {
            0.0
        };

        let curve: Vec<f64> = std::iter::once(initial_equity)
            .chain(equity.iter().map(|s| s.equity))
            .collect();
        let max_drawdown = compute_drawdown(&curve);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&curve, bars_per_year);

        let mut closing_trades = 0usize;
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut realized_pnl = 0.0_f64;
        let mut total_fees = 0.0_f64;

        for trade in trades {
            realized_pnl += trade.realized_pnl;
            total_fees += trade.fee;
            if !trade.is_closing() {
                continue;
            }
            closing_trades += 1;
            let pnl = trade.net_pnl();
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
            }
        }

        let win_rate = if closing_trades > 0 {
            trades_won as f64 / closing_trades as f64
        } else {
            0.0
        };

        let avg_trade_pnl = if closing_trades > 0 {
            (total_wins - total_losses) / closing_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            Some(total_wins / total_losses)
        } else {
            None
        };

        Metrics {
            bars: equity.len(),
            final_equity,
            total_return,
            max_drawdown,
            sharpe_ratio,
            sortino_ratio,
            total_trades: trades.len(),
            closing_trades,
            trades_won,
            trades_lost,
            win_rate,
            avg_trade_pnl,
            profit_factor,
            realized_pnl,
            total_fees,
        }
    }

    /// Named scalar view; only finite values are included so the map always
    /// serializes cleanly.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: f64| {
            if value.is_finite() {
                map.insert(key.to_string(), value);
            }
        };
        put("bars", self.bars as f64);
        put("final_equity", self.final_equity);
        put("total_return", self.total_return);
        put("max_drawdown", self.max_drawdown);
        put("sharpe_ratio", self.sharpe_ratio);
        put("sortino_ratio", self.sortino_ratio);
        put("total_trades", self.total_trades as f64);
        put("closing_trades", self.closing_trades as f64);
        put("trades_won", self.trades_won as f64);
        put("trades_lost", self.trades_lost as f64);
        put("win_rate", self.win_rate);
        put("avg_trade_pnl", self.avg_trade_pnl);
        if let Some(pf) = self.profit_factor {
            put("profit_factor", pf);
        }
        put("realized_pnl", self.realized_pnl);
        put("total_fees", self.total_fees);
        map
    }
}

/// Largest peak-to-trough decline as a fraction of the peak.
pub fn compute_drawdown(curve: &[f64]) -> f64 {
    let Some(&first) = curve.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &equity in curve {
        if equity > peak {
            peak = equity;
        } else if peak > 0.0 {
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn compute_risk_adjusted(curve: &[f64], bars_per_year: f64) -> (f64, f64) {
    if curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let annualization = bars_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        (mean / stddev) * annualization
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();

    let sortino = if downside_stddev > 0.0 {
        (mean / downside_stddev) * annualization
    } else {
        0.0
    };

    (sharpe, sortino)
}
