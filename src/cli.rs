//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestEngine, BacktestResult, RunError};
use crate::domain::config_validation::{
    validate_allocation, validate_backtest_config, validate_strategy_config, validate_symbol,
};
use crate::domain::error::MeridianError;
use crate::domain::indicator::{self, IndicatorKind};
use crate::domain::ohlcv::PriceTable;
use crate::domain::strategy::Strategy;
use crate::domain::sweep::SmaGrid;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Parser, Debug)]
#[command(name = "meridian", about = "Strategy backtester and technical indicators")]
pub struct Cli {
    /// Log verbosity; RUST_LOG takes precedence when set
    #[arg(long, global = true, default_value = "warn", value_parser = LOG_LEVELS)]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Directory for equity.csv and trades.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print indicator columns for a price file as CSV
    Indicators {
        #[arg(short, long)]
        data: PathBuf,
        /// e.g. SMA(20), MACD(12,26,9), BOLLINGER(20,2), STOCHASTIC(14,3)
        #[arg(short, long = "indicator", required = true, num_args = 1..)]
        indicators: Vec<IndicatorKind>,
    },
    /// Run an SMA crossover grid in parallel
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        fast: Vec<usize>,
        #[arg(long, value_delimiter = ',', required = true)]
        slow: Vec<usize>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init()
            .ok();
    }
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(&cli.log_level, cli.json_logs);

    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest(&config, &data, output.as_deref()),
        Command::Indicators { data, indicators } => run_indicators(&data, &indicators),
        Command::Sweep {
            config,
            data,
            fast,
            slow,
        } => run_sweep(&config, &data, fast, slow),
        Command::Validate { config } => run_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, MeridianError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Load a price file and log the range it covers.
pub fn load_prices(path: &Path) -> Result<PriceTable, MeridianError> {
    let data = CsvAdapter::new().load_prices(path)?;
    if let (Some(first), Some(last)) = (data.first_timestamp(), data.last_timestamp()) {
        info!(
            path = %path.display(),
            bars = data.len(),
            first = %first,
            last = %last,
            days = data.span_days(),
            "loaded prices"
        );
    }
    Ok(data)
}

pub fn run_backtest(
    config_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
) -> Result<(), MeridianError> {
    let adapter = load_config(config_path)?;
    let bt_config = validate_backtest_config(&adapter)?;
    let symbol = validate_symbol(&adapter)?;
    let strategy = validate_strategy_config(&adapter, &symbol)?;

    let data = load_prices(data_path)?;

    let mut engine = BacktestEngine::new(bt_config);
    let result = match engine.run_backtest(&strategy, &data) {
        Ok(result) => result,
        Err(err) => return Err(report_partial(err)),
    };

    println!("Strategy:         {}", strategy.name());
    print_summary(&result);

    if let Some(dir) = output {
        CsvReportAdapter::new().write(&result, dir)?;
        eprintln!("Report written to: {}", dir.display());
    }
    Ok(())
}

fn report_partial(err: RunError) -> MeridianError {
    let bar = err
        .bar_index
        .map_or_else(|| "-".to_string(), |i| i.to_string());
    warn!(
        bar = %bar,
        bars_recorded = err.partial.equity_curve.len(),
        trades_recorded = err.partial.trades.len(),
        "run aborted with partial results"
    );
    if let Some(last) = err.partial.equity_curve.last() {
        eprintln!(
            "partial run: {} bars, {} trades, last equity {:.2} at {}",
            err.partial.equity_curve.len(),
            err.partial.trades.len(),
            last.equity,
            last.timestamp
        );
    }
    err.source
}

pub fn print_summary(result: &BacktestResult) {
    let stats = &result.trade_stats;
    println!("Initial Capital:  {:.2}", result.initial_capital);
    println!("Final Equity:     {:.2}", result.final_equity);
    println!("Total Return:     {:.2}%", result.total_return * 100.0);
    println!("Annualized:       {:.2}%", result.annualized_return * 100.0);
    println!("Sharpe Ratio:     {:.2}", result.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", result.sortino_ratio);
    println!("Max Drawdown:     -{:.1}%", result.max_drawdown * 100.0);
    println!("Drawdown Bars:    {}", result.max_drawdown_duration);
    println!("Total Trades:     {}", result.total_trades);
    println!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", stats.profit_factor);
    println!("Avg Win:          {:.2}", stats.avg_win);
    println!("Avg Loss:         {:.2}", stats.avg_loss);
}

pub fn run_indicators(data_path: &Path, kinds: &[IndicatorKind]) -> Result<(), MeridianError> {
    let data = load_prices(data_path)?;

    let mut columns = Vec::new();
    for kind in kinds {
        columns.extend(indicator::compute(*kind, &data)?);
    }

    let mut wtr = csv::Writer::from_writer(io::stdout());
    let csv_err = |e: csv::Error| MeridianError::Data {
        reason: format!("failed to write CSV: {}", e),
    };

    let mut header = vec!["timestamp".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    wtr.write_record(&header).map_err(csv_err)?;

    for (i, bar) in data.bars().iter().enumerate() {
        let mut row = vec![bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        row.extend(
            columns
                .iter()
                .map(|(_, series)| series[i].map(|v| format!("{:.6}", v)).unwrap_or_default()),
        );
        wtr.write_record(&row).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn run_sweep(
    config_path: &Path,
    data_path: &Path,
    fast: Vec<usize>,
    slow: Vec<usize>,
) -> Result<(), MeridianError> {
    let adapter = load_config(config_path)?;
    let bt_config = validate_backtest_config(&adapter)?;
    let grid = SmaGrid {
        symbol: validate_symbol(&adapter)?,
        fast,
        slow,
        allocation: validate_allocation(&adapter)?,
    };

    let data = load_prices(data_path)?;
    let entries = grid.run(&data, &bt_config)?;

    println!("fast,slow,final_equity,total_return,sharpe_ratio,max_drawdown,total_trades");
    for entry in &entries {
        match &entry.outcome {
            Ok(r) => println!(
                "{},{},{:.2},{:.6},{:.6},{:.6},{}",
                entry.fast,
                entry.slow,
                r.final_equity,
                r.total_return,
                r.sharpe_ratio,
                r.max_drawdown,
                r.total_trades
            ),
            Err(e) => {
                warn!(fast = entry.fast, slow = entry.slow, error = %e, "sweep run failed");
                println!("{},{},error: {},,,,", entry.fast, entry.slow, e.source);
            }
        }
    }
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), MeridianError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    let bt_config = validate_backtest_config(&adapter)?;
    let symbol = validate_symbol(&adapter)?;
    let strategy = validate_strategy_config(&adapter, &symbol)?;

    println!("initial_capital = {}", bt_config.initial_capital);
    println!("risk_free_rate = {}", bt_config.risk_free_rate);
    println!("allow_short = {}", bt_config.policy.allow_short);
    println!("allow_negative_cash = {}", bt_config.policy.allow_negative_cash);
    println!("symbol = {}", symbol);
    println!("strategy = {}", strategy.name());
    eprintln!("Configuration is valid.");
    Ok(())
}
