//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::HedgeGridError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Checks `low <= open, close <= high`, finite positive prices and
    /// non-negative volume.
    pub fn validate_ohlc(&self, index: usize) -> Result<(), HedgeGridError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(self.data_error(index, "prices must be finite and positive"));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(self.data_error(index, "volume must be finite and non-negative"));
        }
        if self.low > self.high {
            return Err(self.data_error(index, "low above high"));
        }
        if self.open < self.low || self.open > self.high {
            return Err(self.data_error(index, "open outside low..high"));
        }
        if self.close < self.low || self.close > self.high {
            return Err(self.data_error(index, "close outside low..high"));
        }
        Ok(())
    }

    /// Timestamps must be strictly increasing across the feed.
    pub fn validate_after(&self, prev: &Bar, index: usize) -> Result<(), HedgeGridError> {
        if self.timestamp <= prev.timestamp {
            return Err(self.data_error(
                index,
                format!("timestamp not after previous bar ({})", prev.timestamp),
            ));
        }
        Ok(())
    }

    fn data_error(&self, index: usize, reason: impl Into<String>) -> HedgeGridError {
        HedgeGridError::Data {
            index,
            timestamp: self.timestamp,
            reason: reason.into(),
        }
    }
}
