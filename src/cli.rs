//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, DataWindow, parse_timestamp};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{BacktestConfig, Runner, Termination};
use crate::domain::bar::Bar;
use crate::domain::config_validation::{build_backtest_config, build_params};
use crate::domain::error::HedgeGridError;
use crate::domain::strategy::HedgeGridParams;
use crate::domain::sweep::{grid_params, run_sweep};
use crate::ports::bar_source::VecBarSource;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "HEDGEGRID_LOG";

#[derive(Parser, Debug)]
#[command(name = "hedgegrid", about = "Hedge grid strategy backtester")]
pub struct Cli {
    /// Default filter when HEDGEGRID_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and write the JSON report
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV with header timestamp,open,high,low,close,volume
        #[arg(short, long)]
        data: PathBuf,
        /// Report path, `-` for stdout
        #[arg(short, long, default_value = "-")]
        output: String,
        /// End of the data window (RFC 3339 or epoch millis); defaults to the last bar
        #[arg(long, value_parser = parse_end)]
        end: Option<DateTime<Utc>>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run one backtest per (spacing, levels) pair
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        spacings: Vec<f64>,
        #[arg(long, value_delimiter = ',', required = true)]
        levels: Vec<usize>,
        #[arg(short, long, default_value = "-")]
        output: String,
        #[arg(long, value_parser = parse_end)]
        end: Option<DateTime<Utc>>,
        /// Run the sweep on the current thread only
        #[arg(long)]
        sequential: bool,
    },
}

fn parse_end(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| format!("invalid timestamp {raw:?}"))
}

/// Install the global subscriber. Logs go to stderr so reports on stdout stay
/// machine-readable.
pub fn init_tracing(log_level: &str, log_format: LogFormat) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    match log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init(),
    }
    .map_err(|err| format!("failed to install tracing subscriber: {err}"))
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            end,
        } => run_backtest(&config, &data, &output, end),
        Command::Validate { config } => run_validate(&config),
        Command::Sweep {
            config,
            data,
            spacings,
            levels,
            output,
            end,
            sequential,
        } => run_sweep_command(&config, &data, &spacings, &levels, &output, end, sequential),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

struct Loaded {
    adapter: FileConfigAdapter,
    backtest: BacktestConfig,
    params: HedgeGridParams,
}

fn load_config(path: &Path) -> Result<Loaded, HedgeGridError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    let backtest = build_backtest_config(&adapter)?;
    let params = build_params(&adapter)?;
    Ok(Loaded {
        adapter,
        backtest,
        params,
    })
}

fn load_bars(
    data: &Path,
    end: Option<DateTime<Utc>>,
    config: &BacktestConfig,
) -> Result<Vec<Bar>, HedgeGridError> {
    let window = DataWindow::new(end, config.default_end_months_back);
    CsvAdapter::new(data.to_path_buf()).fetch_bars(&window)
}

fn run_backtest(
    config_path: &Path,
    data_path: &Path,
    output: &str,
    end: Option<DateTime<Utc>>,
) -> Result<ExitCode, HedgeGridError> {
    eprintln!("Loading config from {}", config_path.display());
    let loaded = load_config(config_path)?;

    eprintln!("Loading bars from {}", data_path.display());
    let bars = load_bars(data_path, end, &loaded.backtest)?;
    eprintln!("  {} bars", bars.len());

    let runner = Runner::new(loaded.backtest, loaded.params.clone())?;
    let mut source = VecBarSource::new(bars);
    let result = runner.run(&mut source);

    JsonReportAdapter::new().write(&result, &loaded.params, output)?;

    eprintln!("\nBacktest complete ({} trades)", result.trades.len());
    for key in ["final_equity", "total_return", "max_drawdown", "sharpe_ratio", "win_rate"] {
        if let Some(value) = result.metrics.get(key) {
            eprintln!("  {key:<14} {value:.4}");
        }
    }
    for diag in &result.diagnostics {
        eprintln!("  [{:?}] {} {}", diag.kind, diag.ts, diag.message);
    }

    if result.termination == Termination::DataError {
        // partial results were written; still report the bad feed
        return Ok(ExitCode::from(5));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(config_path: &Path) -> Result<ExitCode, HedgeGridError> {
    eprintln!("Validating config: {}", config_path.display());
    let loaded = load_config(config_path)?;

    eprintln!("\n[backtest]");
    eprintln!("  initial_equity          {}", loaded.backtest.initial_equity);
    eprintln!("  fee_bps                 {}", loaded.backtest.execution.fee_bps);
    eprintln!("  slippage_bps            {}", loaded.backtest.execution.slippage_bps);
    eprintln!("  default_end_months_back {}", loaded.backtest.default_end_months_back);
    eprintln!("\n[strategy]");
    eprintln!("  symbol                  {}", loaded.params.symbol);
    eprintln!("  grid_spacing            {}", loaded.params.grid_spacing);
    eprintln!("  grid_levels             {}", loaded.params.grid_levels);
    eprintln!("  max_position            {}", loaded.params.max_position);
    eprintln!("  max_drawdown            {}", loaded.params.max_drawdown);
    eprintln!("\nConfiguration is valid.");
    Ok(ExitCode::SUCCESS)
}

fn run_sweep_command(
    config_path: &Path,
    data_path: &Path,
    spacings: &[f64],
    levels: &[usize],
    output: &str,
    end: Option<DateTime<Utc>>,
    sequential: bool,
) -> Result<ExitCode, HedgeGridError> {
    let loaded = load_config(config_path)?;
    let parallel = !sequential && loaded.adapter.get_bool("sweep", "parallel", true);

    let bars = load_bars(data_path, end, &loaded.backtest)?;
    let params_list = grid_params(&loaded.params, spacings, levels);
    eprintln!(
        "Sweeping {} parameter sets over {} bars",
        params_list.len(),
        bars.len()
    );

    let entries = run_sweep(&bars, &loaded.backtest, &params_list, parallel)?;
    JsonReportAdapter::new().write_sweep(&entries, output)?;

    for entry in &entries {
        let ret = entry.result.metrics.get("total_return").copied().unwrap_or(0.0);
        eprintln!(
            "  spacing {:<8} levels {:<4} return {:.4}",
            entry.params.grid_spacing, entry.params.grid_levels, ret
        );
    }
    Ok(ExitCode::SUCCESS)
}
