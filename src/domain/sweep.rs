//! Independent backtests run in parallel.
//!
//! Each run builds its own engine and ledger; nothing mutable is shared
//! between runs. Results come back in the order the inputs were given.

use rayon::prelude::*;
use tracing::info;

use super::backtest::{BacktestConfig, BacktestEngine, BacktestResult, RunError};
use super::error::MeridianError;
use super::ohlcv::PriceTable;
use super::strategy::{SmaCrossover, Strategy};

/// Run every strategy over `data` with the same configuration.
pub fn run_many<S>(
    strategies: &[S],
    data: &PriceTable,
    config: &BacktestConfig,
) -> Vec<Result<BacktestResult, RunError>>
where
    S: Strategy + Sync,
{
    info!(runs = strategies.len(), bars = data.len(), "starting parallel runs");
    strategies
        .par_iter()
        .map(|strategy| BacktestEngine::new(config.clone()).run_backtest(strategy, data))
        .collect()
}

/// Fast/slow window grid for [`SmaCrossover`].
#[derive(Debug, Clone, PartialEq)]
pub struct SmaGrid {
    pub symbol: String,
    pub fast: Vec<usize>,
    pub slow: Vec<usize>,
    pub allocation: f64,
}

#[derive(Debug)]
pub struct SweepEntry {
    pub fast: usize,
    pub slow: usize,
    pub outcome: Result<BacktestResult, RunError>,
}

impl SmaGrid {
    /// Valid (fast, slow) pairs, skipping any where fast >= slow.
    pub fn combinations(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &fast in &self.fast {
            for &slow in &self.slow {
                if fast < slow {
                    pairs.push((fast, slow));
                }
            }
        }
        pairs
    }

    pub fn strategies(&self) -> Result<Vec<SmaCrossover>, MeridianError> {
        self.combinations()
            .into_iter()
            .map(|(fast, slow)| SmaCrossover::new(&self.symbol, fast, slow, self.allocation))
            .collect()
    }

    pub fn run(
        &self,
        data: &PriceTable,
        config: &BacktestConfig,
    ) -> Result<Vec<SweepEntry>, MeridianError> {
        let strategies = self.strategies()?;
        if strategies.is_empty() {
            return Err(MeridianError::invalid_parameter(
                "slow",
                "grid has no combination with fast < slow",
            ));
        }
        let outcomes = run_many(&strategies, data, config);
        Ok(strategies
            .iter()
            .zip(outcomes)
            .map(|(s, outcome)| SweepEntry {
                fast: s.fast,
                slow: s.slow,
                outcome,
            })
            .collect())
    }
}
