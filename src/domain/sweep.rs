//! Parameter sweep across independent runs.
//!
//! Every parameter set gets its own [`Runner`] over its own copy of the feed,
//! so nothing is shared between runs and results come back in input order
//! whether or not they were computed in parallel.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::backtest::{BacktestConfig, BacktestResult, Runner};
use super::bar::Bar;
use super::error::HedgeGridError;
use super::strategy::HedgeGridParams;
use crate::ports::bar_source::VecBarSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub params: HedgeGridParams,
    pub result: BacktestResult,
}

/// Cartesian product of spacings and level counts over a base parameter set.
pub fn grid_params(
    base: &HedgeGridParams,
    spacings: &[f64],
    levels: &[usize],
) -> Vec<HedgeGridParams> {
    spacings
        .iter()
        .flat_map(|&grid_spacing| {
            levels.iter().map(move |&grid_levels| HedgeGridParams {
                grid_spacing,
                grid_levels,
                ..base.clone()
            })
        })
        .collect()
}

/// Run one backtest per parameter set. Any invalid set fails the whole sweep
/// before a single bar is processed.
pub fn run_sweep(
    bars: &[Bar],
    config: &BacktestConfig,
    params_list: &[HedgeGridParams],
    parallel: bool,
) -> Result<Vec<SweepEntry>, HedgeGridError> {
    let runners = params_list
        .iter()
        .map(|params| Runner::new(config.clone(), params.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(runs = runners.len(), parallel, "sweep started");

    let run_one = |runner: Runner| {
        let mut source = VecBarSource::new(bars.to_vec());
        runner.run(&mut source)
    };

    let results: Vec<BacktestResult> = if parallel {
        runners.into_par_iter().map(run_one).collect()
    } else {
        runners.into_iter().map(run_one).collect()
    };

    Ok(params_list
        .iter()
        .cloned()
        .zip(results)
        .map(|(params, result)| SweepEntry { params, result })
        .collect())
}
