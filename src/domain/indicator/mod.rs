//! Incremental technical indicators.
//!
//! Indicators here are fed one bar at a time and only ever see bars up to and
//! including the current one:
//! - `IndicatorState`: the market view handed to the strategy for one bar
//! - [`atr::AtrIndicator`]: Average True Range with Wilder smoothing

pub mod atr;

use chrono::{DateTime, Utc};

use super::bar::Bar;

/// Market state after the indicator engine has absorbed the current bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorState {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// Close of the previous bar, `None` on the first bar of the feed.
    pub prev_close: Option<f64>,
    /// `None` until the ATR warmup is complete.
    pub atr: Option<f64>,
}

impl IndicatorState {
    pub fn is_warm(&self) -> bool {
        self.atr.is_some()
    }

    /// ATR relative to `reference`; `None` during warmup.
    pub fn normalized_atr(&self, reference: f64) -> Option<f64> {
        match self.atr {
            Some(atr) if reference > 0.0 => Some(atr / reference),
            _ => None,
        }
    }
}

/// Runs every indicator the strategy depends on.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    atr: atr::AtrIndicator,
    prev_close: Option<f64>,
}

impl IndicatorEngine {
    pub fn new(atr_period: usize) -> Self {
        IndicatorEngine {
            atr: atr::AtrIndicator::new(atr_period),
            prev_close: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> IndicatorState {
        let prev_close = self.prev_close;
        let atr = self.atr.update(bar);
        self.prev_close = Some(bar.close);
        IndicatorState {
            timestamp: bar.timestamp,
            close: bar.close,
            high: bar.high,
            low: bar.low,
            prev_close,
            atr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(minute: i64, close: f64) -> Bar {
        Bar {
            timestamp: DateTime::from_timestamp(minute * 60, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn first_bar_has_no_prev_close() {
        let mut engine = IndicatorEngine::new(2);
        let state = engine.update(&bar(0, 100.0));
        assert_eq!(state.prev_close, None);
        assert!(!state.is_warm());
    }

    #[test]
    fn prev_close_tracks_feed() {
        let mut engine = IndicatorEngine::new(2);
        engine.update(&bar(0, 100.0));
        let state = engine.update(&bar(1, 101.0));
        assert_eq!(state.prev_close, Some(100.0));
        assert!(state.is_warm());
    }

    #[test]
    fn normalized_atr_divides_by_reference() {
        let state = IndicatorState {
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            close: 200.0,
            high: 201.0,
            low: 199.0,
            prev_close: None,
            atr: Some(4.0),
        };
        assert_eq!(state.normalized_atr(200.0), Some(0.02));
        assert_eq!(state.normalized_atr(0.0), None);
    }
}
