//! Backtest engine and event loop.
//!
//! The engine walks a [`PriceTable`] one bar at a time. For each bar it asks
//! the strategy for an [`Action`], fills it at the bar's close against the
//! ledger, then marks every open position to that close and records an
//! [`EquityPoint`]. Statistics are derived once the loop finishes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::error::MeridianError;
use super::ledger::{ExecutionPolicy, Ledger};
use super::metrics::{Metrics, TradeStats};
use super::ohlcv::{PriceBar, PriceTable};
use super::position::Trade;
use super::strategy::{Action, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub policy: ExecutionPolicy,
    /// Annual rate, subtracted from daily returns in the Sharpe and Sortino ratios.
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn new(initial_capital: f64) -> Self {
        BacktestConfig {
            initial_capital,
            policy: ExecutionPolicy::default(),
            risk_free_rate: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), MeridianError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(MeridianError::invalid_parameter(
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(MeridianError::invalid_parameter(
                "risk_free_rate",
                format!("must be in [0, 1), got {}", self.risk_free_rate),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Complete,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// State accumulated before a run was aborted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRun {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
}

#[derive(Debug, thiserror::Error)]
#[error("backtest aborted: {source}")]
pub struct RunError {
    pub source: MeridianError,
    /// Bar being processed when the run stopped; `None` if it never started.
    pub bar_index: Option<usize>,
    pub partial: PartialRun,
}

impl From<MeridianError> for RunError {
    fn from(source: MeridianError) -> Self {
        RunError {
            source,
            bar_index: None,
            partial: PartialRun::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trade_stats: TradeStats,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
}

impl BacktestResult {
    fn from_run(
        config: &BacktestConfig,
        equity_curve: Vec<EquityPoint>,
        trades: Vec<Trade>,
    ) -> Self {
        let metrics = Metrics::compute(
            &equity_curve,
            &trades,
            config.initial_capital,
            config.risk_free_rate,
        );
        BacktestResult {
            initial_capital: config.initial_capital,
            final_equity: metrics.final_equity,
            total_return: metrics.total_return,
            annualized_return: metrics.annualized_return,
            sharpe_ratio: metrics.sharpe_ratio,
            sortino_ratio: metrics.sortino_ratio,
            max_drawdown: metrics.max_drawdown,
            max_drawdown_duration: metrics.max_drawdown_duration,
            total_trades: metrics.total_trades,
            trade_stats: metrics.trade_stats,
            equity_curve,
            trades,
        }
    }
}

pub struct BacktestEngine {
    config: BacktestConfig,
    state: EngineState,
    stop: Option<Arc<AtomicBool>>,
    trades: Vec<Trade>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        BacktestEngine {
            config,
            state: EngineState::Idle,
            stop: None,
            trades: Vec::new(),
        }
    }

    /// Check `flag` between bars and abort with `Cancelled` once it is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Trade log of the last finished or aborted run.
    pub fn get_trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn run_backtest<S>(
        &mut self,
        strategy: &S,
        data: &PriceTable,
    ) -> Result<BacktestResult, RunError>
    where
        S: Strategy + ?Sized,
    {
        self.state = EngineState::Running;
        self.trades.clear();

        if let Err(err) = self.config.validate() {
            return Err(self.abort(err, None, PartialRun::default()));
        }
        if data.is_empty() {
            return Err(self.abort(MeridianError::EmptyDataset, None, PartialRun::default()));
        }

        info!(
            strategy = %strategy.name(),
            bars = data.len(),
            initial_capital = self.config.initial_capital,
            "starting backtest"
        );

        let bars = data.bars();
        let mut ledger = Ledger::new(self.config.initial_capital, self.config.policy);
        let mut equity_curve = Vec::with_capacity(bars.len());

        for (i, bar) in bars.iter().enumerate() {
            if self.stop_requested() {
                let partial = PartialRun {
                    equity_curve,
                    trades: ledger.take_trades(),
                };
                return Err(self.abort(
                    MeridianError::Cancelled { bars_processed: i },
                    Some(i),
                    partial,
                ));
            }

            let action = strategy.on_bar(
                bar,
                ledger.snapshot_positions(),
                ledger.cash(),
                &bars[..=i],
            );

            if let Err(err) = execute(&mut ledger, &action, bar) {
                let partial = PartialRun {
                    equity_curve,
                    trades: ledger.take_trades(),
                };
                return Err(self.abort(err, Some(i), partial));
            }

            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: mark_at_close(&ledger, bar.close),
            });
        }

        let trades = ledger.take_trades();
        self.trades = trades.clone();
        self.state = EngineState::Complete;

        let result = BacktestResult::from_run(&self.config, equity_curve, trades);
        info!(
            final_equity = result.final_equity,
            total_return = result.total_return,
            trades = result.total_trades,
            "backtest complete"
        );
        Ok(result)
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn abort(
        &mut self,
        source: MeridianError,
        bar_index: Option<usize>,
        partial: PartialRun,
    ) -> RunError {
        warn!(
            error = %source,
            bar = ?bar_index,
            bars_recorded = partial.equity_curve.len(),
            "backtest aborted"
        );
        self.trades = partial.trades.clone();
        self.state = EngineState::Aborted;
        RunError {
            source,
            bar_index,
            partial,
        }
    }
}

/// Run `strategy` over `data` with the default execution policy.
pub fn run_backtest<S>(
    strategy: &S,
    data: &PriceTable,
    initial_capital: f64,
) -> Result<BacktestResult, RunError>
where
    S: Strategy + ?Sized,
{
    BacktestEngine::new(BacktestConfig::new(initial_capital)).run_backtest(strategy, data)
}

fn execute(ledger: &mut Ledger, action: &Action, bar: &PriceBar) -> Result<(), MeridianError> {
    let Some(order) = action.to_order(bar.close) else {
        return Ok(());
    };
    if !order.quantity.is_finite() || order.quantity <= 0.0 {
        return Err(MeridianError::invalid_action(format!(
            "strategy returned non-positive quantity {} for {}",
            order.quantity, order.symbol
        )));
    }
    let trade = ledger.apply(&order, bar.timestamp)?;
    debug!(
        symbol = %trade.symbol,
        side = %trade.side,
        quantity = trade.quantity,
        price = trade.price,
        timestamp = %trade.timestamp,
        "fill"
    );
    Ok(())
}

/// The table carries one instrument, so every open position is valued at
/// the current bar's close.
fn mark_at_close(ledger: &Ledger, close: f64) -> f64 {
    let prices: HashMap<String, f64> = ledger
        .snapshot_positions()
        .keys()
        .map(|symbol| (symbol.clone(), close))
        .collect();
    ledger.mark_to_market(&prices)
}
