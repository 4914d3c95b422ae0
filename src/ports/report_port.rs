//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::HedgeGridError;
use crate::domain::strategy::HedgeGridParams;
use crate::domain::sweep::SweepEntry;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        params: &HedgeGridParams,
        output_path: &str,
    ) -> Result<(), HedgeGridError>;

    fn write_sweep(&self, entries: &[SweepEntry], output_path: &str) -> Result<(), HedgeGridError>;
}
