//! meridian: strategy backtesting and technical indicators.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;

pub use domain::backtest::{
    BacktestConfig, BacktestEngine, BacktestResult, EngineState, EquityPoint, PartialRun,
    RunError, run_backtest,
};
pub use domain::error::MeridianError;
pub use domain::ledger::{ExecutionPolicy, Ledger, Positions};
pub use domain::ohlcv::{PriceBar, PriceTable};
pub use domain::position::{Position, Side, Trade};
pub use domain::strategy::{Action, Strategy};
