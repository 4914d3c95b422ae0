//! CSV file data adapter.
//!
//! Expects a header row `timestamp,open,high,low,close,volume`. Timestamps are
//! RFC 3339 strings or integer epoch milliseconds. Rows are passed through in
//! file order; ordering and OHLC consistency are checked by the engine.

use crate::domain::bar::Bar;
use crate::domain::error::HedgeGridError;
use chrono::{DateTime, Months, Utc};
use serde::Deserialize;
use std::fs::File;
use std::path::PathBuf;

/// Time bounds for loading: `[end - months_back, end]`, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataWindow {
    /// Defaults to the timestamp of the last row in the file.
    pub end: Option<DateTime<Utc>>,
    pub months_back: u32,
}

impl DataWindow {
    pub fn new(end: Option<DateTime<Utc>>, months_back: u32) -> Self {
        Self { end, months_back }
    }

    fn bounds(&self, last: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.end.unwrap_or(last);
        let start = end
            .checked_sub_months(Months::new(self.months_back))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        (start, end)
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn fetch_bars(&self, window: &DataWindow) -> Result<Vec<Bar>, HedgeGridError> {
        let file = File::open(&self.path).map_err(|e| HedgeGridError::Csv {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let mut bars = Vec::new();
        for (i, result) in rdr.deserialize::<CsvRow>().enumerate() {
            // header is line 1
            let line = i + 2;
            let row = result.map_err(|e| HedgeGridError::Csv {
                reason: format!("line {}: {}", line, e),
            })?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| HedgeGridError::Csv {
                reason: format!("line {}: invalid timestamp {:?}", line, row.timestamp),
            })?;
            bars.push(Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        let Some(last) = bars.last().map(|b| b.timestamp) else {
            return Ok(bars);
        };
        let (start, end) = window.bounds(last);
        bars.retain(|b| b.timestamp >= start && b.timestamp <= end);

        tracing::debug!(
            path = %self.path.display(),
            bars = bars.len(),
            %start,
            %end,
            "loaded bars"
        );
        Ok(bars)
    }
}

/// RFC 3339, or integer milliseconds since the Unix epoch.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "timestamp,open,high,low,close,volume\n";

    fn write_csv(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, format!("{HEADER}{body}")).unwrap();
        path
    }

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn fetch_bars_returns_correct_data() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "ETHUSDT.csv",
            "2024-01-15T00:00:00Z,2000.0,2010.0,1990.0,2005.0,12.5\n\
             2024-01-15T00:01:00Z,2005.0,2006.0,1999.0,2001.0,3\n",
        );
        let bars = CsvAdapter::new(path)
            .fetch_bars(&DataWindow::new(None, 3))
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, ts("2024-01-15T00:00:00Z"));
        assert_eq!(bars[0].open, 2000.0);
        assert_eq!(bars[0].high, 2010.0);
        assert_eq!(bars[0].low, 1990.0);
        assert_eq!(bars[0].close, 2005.0);
        assert_eq!(bars[0].volume, 12.5);
    }

    #[test]
    fn epoch_millis_timestamps() {
        assert_eq!(parse_timestamp("60000"), Some(ts("1970-01-01T00:01:00Z")));
        assert_eq!(
            parse_timestamp("2024-01-15T01:00:00+01:00"),
            Some(ts("2024-01-15T00:00:00Z"))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn window_defaults_to_last_bar() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "a.csv",
            "2023-12-01T00:00:00Z,1,1,1,1,0\n\
             2024-03-01T00:00:00Z,1,1,1,1,0\n\
             2024-05-01T00:00:00Z,1,1,1,1,0\n",
        );
        let bars = CsvAdapter::new(path)
            .fetch_bars(&DataWindow::new(None, 3))
            .unwrap();
        let times: Vec<_> = bars.iter().map(|b| b.timestamp).collect();
        assert_eq!(
            times,
            vec![ts("2024-03-01T00:00:00Z"), ts("2024-05-01T00:00:00Z")]
        );
    }

    #[test]
    fn explicit_end_bounds_both_sides() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "a.csv",
            "2024-01-01T00:00:00Z,1,1,1,1,0\n\
             2024-02-01T00:00:00Z,1,1,1,1,0\n\
             2024-03-01T00:00:00Z,1,1,1,1,0\n",
        );
        let window = DataWindow::new(Some(ts("2024-02-15T00:00:00Z")), 1);
        let bars = CsvAdapter::new(path).fetch_bars(&window).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, ts("2024-02-01T00:00:00Z"));
    }

    #[test]
    fn rows_are_not_reordered() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "a.csv",
            "120000,1,1,1,1,0\n\
             60000,1,1,1,1,0\n",
        );
        let bars = CsvAdapter::new(path)
            .fetch_bars(&DataWindow::new(None, 1))
            .unwrap();
        assert!(bars[0].timestamp > bars[1].timestamp);
    }

    #[test]
    fn empty_file_yields_no_bars() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "");
        let bars = CsvAdapter::new(path)
            .fetch_bars(&DataWindow::new(None, 3))
            .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn bad_number_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "a.csv",
            "60000,1,1,1,1,0\n\
             120000,1,abc,1,1,0\n",
        );
        let err = CsvAdapter::new(path)
            .fetch_bars(&DataWindow::new(None, 3))
            .unwrap_err();
        assert!(matches!(err, HedgeGridError::Csv { .. }));
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn bad_timestamp_is_csv_error() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv", "soon,1,1,1,1,0\n");
        let err = CsvAdapter::new(path)
            .fetch_bars(&DataWindow::new(None, 3))
            .unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn missing_file_is_error() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/bars.csv"));
        assert!(adapter.fetch_bars(&DataWindow::new(None, 3)).is_err());
    }
}
