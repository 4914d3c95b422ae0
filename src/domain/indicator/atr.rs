//! Average True Range, computed incrementally.
//!
//! TR[0] = high - low, TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! Seed with the simple mean of the first n true ranges, then
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n (Wilder smoothing).
//! Warmup: the first (n-1) bars have no value.

use std::collections::VecDeque;

use crate::domain::bar::Bar;

#[derive(Debug, Clone)]
pub struct AtrIndicator {
    period: usize,
    warmup: VecDeque<f64>,
    prev_close: Option<f64>,
    value: Option<f64>,
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        AtrIndicator {
            period,
            warmup: VecDeque::new(),
            prev_close: None,
            value: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        if self.period == 0 {
            return None;
        }

        let tr = match self.prev_close {
            Some(prev) => bar.true_range(prev),
            None => bar.high - bar.low,
        };
        self.prev_close = Some(bar.close);

        self.value = match self.value {
            Some(prev_atr) => {
                let n = self.period as f64;
                Some((prev_atr * (n - 1.0) + tr) / n)
            }
            None => {
                self.warmup.push_back(tr);
                if self.warmup.len() == self.period {
                    let seed = self.warmup.iter().sum::<f64>() / self.period as f64;
                    self.warmup.clear();
                    Some(seed)
                } else {
                    None
                }
            }
        };
        self.value
    }
}
