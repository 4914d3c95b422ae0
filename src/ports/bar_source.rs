//! Bar supply port.

use crate::domain::bar::Bar;

/// Synchronous pull of bars for a single symbol in ascending timestamp order.
///
/// Gaps are allowed and are never filled in by the engine; ordering and OHLC
/// consistency are checked by the runner as bars arrive.
pub trait BarSource {
    /// `None` at end of stream.
    fn next_bar(&mut self) -> Option<Bar>;
}

/// Bars already materialized in memory.
#[derive(Debug, Clone)]
pub struct VecBarSource {
    bars: std::vec::IntoIter<Bar>,
}

impl VecBarSource {
    pub fn new(bars: Vec<Bar>) -> Self {
        VecBarSource {
            bars: bars.into_iter(),
        }
    }
}

impl BarSource for VecBarSource {
    fn next_bar(&mut self) -> Option<Bar> {
        self.bars.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn bar(minute: i64) -> Bar {
        Bar {
            timestamp: DateTime::from_timestamp(minute * 60, 0).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        }
    }

    #[test]
    fn yields_bars_then_ends() {
        let mut source = VecBarSource::new(vec![bar(0), bar(1)]);
        assert_eq!(source.next_bar(), Some(bar(0)));
        assert_eq!(source.next_bar(), Some(bar(1)));
        assert_eq!(source.next_bar(), None);
        assert_eq!(source.next_bar(), None);
    }
}
