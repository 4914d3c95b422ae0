#![allow(dead_code)]

use chrono::{DateTime, Utc};
use hedgegrid::domain::backtest::BacktestConfig;
use hedgegrid::domain::bar::Bar;
use hedgegrid::domain::strategy::HedgeGridParams;
use hedgegrid::ports::bar_source::BarSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn ts(minute: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(minute * 60, 0).unwrap()
}

pub fn flat_bar(minute: i64, price: f64) -> Bar {
    Bar {
        timestamp: ts(minute),
        open: price,
        high: price,
        low: price,
        close: price,
        volume: 1.0,
    }
}

/// Opens at `open`, closes at `close`, wicks `wick` beyond both.
pub fn bar(minute: i64, open: f64, close: f64, wick: f64) -> Bar {
    Bar {
        timestamp: ts(minute),
        open,
        high: open.max(close) + wick,
        low: open.min(close) - wick,
        close,
        volume: 1.0,
    }
}

pub fn flat_series(count: i64, price: f64) -> Vec<Bar> {
    (0..count).map(|i| flat_bar(i, price)).collect()
}

/// Consecutive bars through `closes`, each opening at the previous close.
pub fn path(start_minute: i64, first_open: f64, closes: &[f64], wick: f64) -> Vec<Bar> {
    let mut prev = first_open;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let b = bar(start_minute + i as i64, prev, close, wick);
            prev = close;
            b
        })
        .collect()
}

/// Bars that open at the previous close, never trade above it, and wick one
/// unit below the close.
pub fn falling_path(start_minute: i64, first_open: f64, closes: &[f64]) -> Vec<Bar> {
    let mut prev = first_open;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let b = Bar {
                timestamp: ts(start_minute + i as i64),
                open: prev,
                high: prev,
                low: close - 1.0,
                close,
                volume: 1.0,
            };
            prev = close;
            b
        })
        .collect()
}

/// Mirror of [`falling_path`]: never trades below the open, wicks one unit
/// above the close.
pub fn rising_path(start_minute: i64, first_open: f64, closes: &[f64]) -> Vec<Bar> {
    let mut prev = first_open;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let b = Bar {
                timestamp: ts(start_minute + i as i64),
                open: prev,
                high: close + 1.0,
                low: prev,
                close,
                volume: 1.0,
            };
            prev = close;
            b
        })
        .collect()
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig::default()
}

pub fn sample_params() -> HedgeGridParams {
    HedgeGridParams {
        grid_levels: 3,
        ..HedgeGridParams::default()
    }
}

/// Yields bars and raises `cancel` once `after` bars have been handed out.
pub struct CancellingSource {
    bars: std::vec::IntoIter<Bar>,
    served: usize,
    after: usize,
    cancel: Arc<AtomicBool>,
}

impl CancellingSource {
    pub fn new(bars: Vec<Bar>, after: usize, cancel: Arc<AtomicBool>) -> Self {
        Self {
            bars: bars.into_iter(),
            served: 0,
            after,
            cancel,
        }
    }

    pub fn served(&self) -> usize {
        self.served
    }
}

impl BarSource for CancellingSource {
    fn next_bar(&mut self) -> Option<Bar> {
        let bar = self.bars.next()?;
        self.served += 1;
        if self.served >= self.after {
            self.cancel.store(true, Ordering::Relaxed);
        }
        Some(bar)
    }
}
