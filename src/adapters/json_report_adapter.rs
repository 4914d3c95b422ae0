//! JSON report adapter implementing ReportPort.
//!
//! Output is pretty-printed and byte-stable for identical runs: metrics are a
//! `BTreeMap` and every other collection keeps engine order. An output path of
//! `-` writes to stdout.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::{BacktestResult, Termination};
use crate::domain::error::HedgeGridError;
use crate::domain::strategy::HedgeGridParams;
use crate::domain::sweep::SweepEntry;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct BacktestReport<'a> {
    params: &'a HedgeGridParams,
    result: &'a BacktestResult,
}

#[derive(Serialize)]
struct SweepRow<'a> {
    params: &'a HedgeGridParams,
    metrics: &'a BTreeMap<String, f64>,
    termination: Termination,
    diagnostics: usize,
}

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        JsonReportAdapter
    }

    fn emit<T: Serialize>(value: &T, output_path: &str) -> Result<(), HedgeGridError> {
        let mut body = serde_json::to_string_pretty(value)?;
        body.push('\n');
        if output_path == "-" {
            let mut out = io::stdout().lock();
            out.write_all(body.as_bytes())?;
            out.flush()?;
        } else {
            fs::write(Path::new(output_path), body)?;
        }
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        params: &HedgeGridParams,
        output_path: &str,
    ) -> Result<(), HedgeGridError> {
        Self::emit(&BacktestReport { params, result }, output_path)
    }

    /// One summary row per run; equity curves and ledgers are left out.
    fn write_sweep(&self, entries: &[SweepEntry], output_path: &str) -> Result<(), HedgeGridError> {
        let rows: Vec<SweepRow<'_>> = entries
            .iter()
            .map(|entry| SweepRow {
                params: &entry.params,
                metrics: &entry.result.metrics,
                termination: entry.result.termination,
                diagnostics: entry.result.diagnostics.len(),
            })
            .collect();
        Self::emit(&rows, output_path)
    }
}
