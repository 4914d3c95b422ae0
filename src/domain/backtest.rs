//! Backtest engine and event loop.
//!
//! Per bar, in this order: validate the bar, update indicators, ask the
//! strategy for orders, fill them in emission order, apply fills to the
//! position, snapshot equity, then let the drawdown monitor transition.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::equity::{EquityRecorder, EquitySnapshot};
use super::error::HedgeGridError;
use super::execution::{self, ExecutionConfig};
use super::indicator::IndicatorEngine;
use super::metrics::{MINUTE_BARS_PER_YEAR, Metrics};
use super::order::{IdGen, Order, Trade};
use super::position::{PositionSnapshot, PositionTracker};
use super::risk::{DrawdownMonitor, RiskState, RiskTransition};
use super::strategy::{self, GridAnchor, HedgeGridParams, StrategyContext};
use crate::ports::bar_source::{BarSource, VecBarSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_equity: f64,
    pub execution: ExecutionConfig,
    /// Only bounds the requested data window; the engine never reads it.
    pub default_end_months_back: u32,
    /// Annualization factor for the Sharpe/Sortino ratios.
    pub bars_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_equity: 10_000.0,
            execution: ExecutionConfig::default(),
            default_end_months_back: 3,
            bars_per_year: MINUTE_BARS_PER_YEAR,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), HedgeGridError> {
        if !self.initial_equity.is_finite() || self.initial_equity <= 0.0 {
            return Err(HedgeGridError::invalid(
                "backtest",
                "initial_equity",
                "initial_equity must be positive",
            ));
        }
        self.execution.validate()?;
        if !self.bars_per_year.is_finite() || self.bars_per_year <= 0.0 {
            return Err(HedgeGridError::invalid(
                "backtest",
                "bars_per_year",
                "bars_per_year must be positive",
            ));
        }
        if self.default_end_months_back == 0 {
            return Err(HedgeGridError::invalid(
                "backtest",
                "default_end_months_back",
                "default_end_months_back must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    OrderRejected,
    DataError,
    RiskHalted,
    RiskResumed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub ts: DateTime<Utc>,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The bar source ran dry.
    Exhausted,
    /// A bad bar stopped the loop; results up to the previous bar are kept.
    DataError,
    /// Stopped between bars on request.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub metrics: BTreeMap<String, f64>,
    pub equity: Vec<EquitySnapshot>,
    pub trades: Vec<Trade>,
    pub positions: Vec<PositionSnapshot>,
    pub orders: Vec<Order>,
    pub diagnostics: Vec<Diagnostic>,
    pub termination: Termination,
}

impl BacktestResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity.last().map(|s| s.equity)
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

/// One run's worth of engine state. Nothing here is shared between runs.
#[derive(Debug)]
pub struct Runner {
    config: BacktestConfig,
    params: HedgeGridParams,
    indicators: IndicatorEngine,
    tracker: PositionTracker,
    recorder: EquityRecorder,
    monitor: DrawdownMonitor,
    anchor: Option<GridAnchor>,
    order_ids: IdGen,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    positions: Vec<PositionSnapshot>,
    diagnostics: Vec<Diagnostic>,
    last_bar: Option<Bar>,
    bars_seen: usize,
}

impl Runner {
    /// Fails fast with a config error before any bar is read.
    pub fn new(config: BacktestConfig, params: HedgeGridParams) -> Result<Self, HedgeGridError> {
        config.validate()?;
        params.validate()?;

        Ok(Runner {
            indicators: IndicatorEngine::new(params.atr_period),
            tracker: PositionTracker::new(params.symbol.clone()),
            recorder: EquityRecorder::new(config.initial_equity),
            monitor: DrawdownMonitor::new(config.initial_equity, params.max_drawdown),
            anchor: None,
            order_ids: IdGen::new(),
            orders: Vec::new(),
            trades: Vec::new(),
            positions: Vec::new(),
            diagnostics: Vec::new(),
            last_bar: None,
            bars_seen: 0,
            config,
            params,
        })
    }

    pub fn risk_state(&self) -> RiskState {
        self.monitor.state()
    }

    pub fn position(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn anchor(&self) -> Option<GridAnchor> {
        self.anchor
    }

    pub fn equity(&self) -> &[EquitySnapshot] {
        self.recorder.snapshots()
    }

    /// Process one bar. Only a bad bar returns an error, in which case no
    /// state has been touched.
    pub fn step(&mut self, bar: &Bar) -> Result<(), HedgeGridError> {
        let index = self.bars_seen;
        bar.validate_ohlc(index)?;
        if let Some(prev) = &self.last_bar {
            bar.validate_after(prev, index)?;
        }

        let state = self.indicators.update(bar);

        let ctx = StrategyContext {
            position: self.tracker.quantity(),
            equity: self.recorder.mark(&self.tracker, bar.close),
            risk_state: self.monitor.state(),
        };
        let decision = strategy::decide(
            &state,
            self.anchor,
            &ctx,
            &self.params,
            &mut self.order_ids,
        );
        if decision.anchor != self.anchor {
            if let Some(grid) = &decision.anchor {
                tracing::debug!(
                    ts = %bar.timestamp,
                    reference = grid.reference,
                    spacing = grid.spacing,
                    "grid anchored"
                );
            }
        }
        self.anchor = decision.anchor;

        for order in decision.orders {
            self.execute(&order, bar);
            self.orders.push(order);
        }

        let cash = self.recorder.cash(&self.tracker);
        let equity = self
            .recorder
            .snapshot(bar.timestamp, cash, &self.tracker, bar.close)
            .equity;

        match self.monitor.on_bar_close(equity, self.tracker.is_flat()) {
            Some(RiskTransition::Halted) => {
                let drawdown = self.monitor.drawdown(equity);
                tracing::warn!(
                    ts = %bar.timestamp,
                    equity,
                    drawdown,
                    limit = self.params.max_drawdown,
                    "drawdown limit breached, halting"
                );
                self.diagnose(
                    bar.timestamp,
                    DiagnosticKind::RiskHalted,
                    format!(
                        "drawdown {drawdown:.4} exceeded {:.4}",
                        self.params.max_drawdown
                    ),
                );
            }
            Some(RiskTransition::Resumed) => {
                tracing::info!(ts = %bar.timestamp, equity, "drawdown recovered, resuming");
                self.diagnose(
                    bar.timestamp,
                    DiagnosticKind::RiskResumed,
                    "flat and within drawdown limit".to_string(),
                );
            }
            None => {}
        }

        self.last_bar = Some(bar.clone());
        self.bars_seen += 1;
        Ok(())
    }

    fn execute(&mut self, order: &Order, bar: &Bar) {
        // trade ids stay dense since expired limits never reach the ledger
        let trade_id = self.trades.len() as u64 + 1;
        match execution::fill(order, bar, &self.config.execution, trade_id) {
            Ok(Some(fill)) => {
                let update = self.tracker.apply(&fill, bar.close);
                let trade = Trade {
                    realized_pnl: update.realized_pnl,
                    closed_quantity: update.closed_quantity,
                    ..fill
                };
                tracing::debug!(
                    ts = %trade.timestamp,
                    order_id = trade.order_id,
                    side = %trade.side,
                    quantity = trade.quantity,
                    price = trade.price,
                    fee = trade.fee,
                    position = update.snapshot.quantity,
                    "fill"
                );
                self.trades.push(trade);
                self.positions.push(update.snapshot);
            }
            Ok(None) => {
                tracing::debug!(order_id = order.id, "limit not reached, order expired");
            }
            Err(err) => {
                tracing::warn!(ts = %bar.timestamp, error = %err, "order rejected");
                self.diagnose(bar.timestamp, DiagnosticKind::OrderRejected, err.to_string());
            }
        }
    }

    fn diagnose(&mut self, ts: DateTime<Utc>, kind: DiagnosticKind, message: String) {
        self.diagnostics.push(Diagnostic { ts, kind, message });
    }

    /// Drain the source. A bad bar ends the run but keeps what came before it.
    pub fn run<S: BarSource>(self, source: &mut S) -> BacktestResult {
        self.run_until(source, &AtomicBool::new(false))
    }

    /// Like [`Runner::run`], checking `cancel` between bars.
    pub fn run_until<S: BarSource>(mut self, source: &mut S, cancel: &AtomicBool) -> BacktestResult {
        tracing::info!(
            symbol = %self.params.symbol,
            initial_equity = self.config.initial_equity,
            "backtest started"
        );

        let termination = loop {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(bars = self.bars_seen, "backtest cancelled");
                break Termination::Cancelled;
            }
            let Some(bar) = source.next_bar() else {
                break Termination::Exhausted;
            };
            if let Err(err) = self.step(&bar) {
                tracing::warn!(error = %err, "stopping on bad bar");
                self.diagnose(bar.timestamp, DiagnosticKind::DataError, err.to_string());
                break Termination::DataError;
            }
        };

        self.finish(termination)
    }

    pub fn finish(self, termination: Termination) -> BacktestResult {
        let equity = self.recorder.into_snapshots();
        let metrics = Metrics::compute(
            &equity,
            &self.trades,
            self.config.initial_equity,
            self.config.bars_per_year,
        );

        tracing::info!(
            bars = self.bars_seen,
            trades = self.trades.len(),
            final_equity = metrics.final_equity,
            ?termination,
            "backtest finished"
        );

        BacktestResult {
            metrics: metrics.to_map(),
            equity,
            trades: self.trades,
            positions: self.positions,
            orders: self.orders,
            diagnostics: self.diagnostics,
            termination,
        }
    }
}

/// Convenience wrapper over an in-memory feed.
pub fn run_backtest(
    bars: &[Bar],
    config: &BacktestConfig,
    params: &HedgeGridParams,
) -> Result<BacktestResult, HedgeGridError> {
    let runner = Runner::new(config.clone(), params.clone())?;
    let mut source = VecBarSource::new(bars.to_vec());
    Ok(runner.run(&mut source))
}
