//! Configuration validation.
//!
//! Reads the `[backtest]` and `[strategy]` sections into domain types,
//! failing on the first missing or invalid key. Nothing here touches price
//! data, so a bad configuration is reported before any loading happens.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::MeridianError;
use crate::domain::ledger::ExecutionPolicy;
use crate::domain::strategy::{BuiltinStrategy, MacdCrossover, RsiReversion, SmaCrossover};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SYMBOL: &str = "ASSET";
pub const DEFAULT_ALLOCATION: f64 = 0.1;

const BACKTEST: &str = "backtest";
const STRATEGY: &str = "strategy";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, MeridianError> {
    let initial_capital = config
        .get_double(BACKTEST, "initial_capital")?
        .ok_or_else(|| MeridianError::ConfigMissing {
            section: BACKTEST.to_string(),
            key: "initial_capital".to_string(),
        })?;
    if !initial_capital.is_finite() || initial_capital <= 0.0 {
        return Err(MeridianError::config_invalid(
            BACKTEST,
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let risk_free_rate = config.get_double(BACKTEST, "risk_free_rate")?.unwrap_or(0.0);
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(MeridianError::config_invalid(
            BACKTEST,
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let policy = if config.get_bool(BACKTEST, "strict")?.unwrap_or(false) {
        ExecutionPolicy::strict()
    } else {
        let default = ExecutionPolicy::permissive();
        ExecutionPolicy {
            allow_short: config
                .get_bool(BACKTEST, "allow_short")?
                .unwrap_or(default.allow_short),
            allow_negative_cash: config
                .get_bool(BACKTEST, "allow_negative_cash")?
                .unwrap_or(default.allow_negative_cash),
        }
    };

    Ok(BacktestConfig {
        initial_capital,
        policy,
        risk_free_rate,
    })
}

pub fn validate_symbol(config: &dyn ConfigPort) -> Result<String, MeridianError> {
    match config.get_string(BACKTEST, "symbol") {
        None => Ok(DEFAULT_SYMBOL.to_string()),
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(_) => Err(MeridianError::config_invalid(
            BACKTEST,
            "symbol",
            "symbol must not be empty",
        )),
    }
}

pub fn validate_strategy_config(
    config: &dyn ConfigPort,
    symbol: &str,
) -> Result<BuiltinStrategy, MeridianError> {
    let name = match config.get_string(STRATEGY, "name") {
        Some(s) if !s.trim().is_empty() => s.trim().to_lowercase(),
        _ => {
            return Err(MeridianError::ConfigMissing {
                section: STRATEGY.to_string(),
                key: "name".to_string(),
            });
        }
    };
    let allocation = validate_allocation(config)?;

    let strategy = match name.as_str() {
        "sma_crossover" => SmaCrossover::new(
            symbol,
            window(config, "fast", 10)?,
            window(config, "slow", 20)?,
            allocation,
        )
        .map(BuiltinStrategy::SmaCrossover),
        "rsi_reversion" => RsiReversion::new(
            symbol,
            window(config, "rsi_window", 14)?,
            config.get_double(STRATEGY, "oversold")?.unwrap_or(30.0),
            config.get_double(STRATEGY, "overbought")?.unwrap_or(70.0),
            allocation,
        )
        .map(BuiltinStrategy::RsiReversion),
        "macd_crossover" => MacdCrossover::new(
            symbol,
            window(config, "fast", 12)?,
            window(config, "slow", 26)?,
            window(config, "signal", 9)?,
            allocation,
        )
        .map(BuiltinStrategy::MacdCrossover),
        other => {
            return Err(MeridianError::config_invalid(
                STRATEGY,
                "name",
                format!(
                    "unknown strategy {:?}, expected sma_crossover, rsi_reversion or macd_crossover",
                    other
                ),
            ));
        }
    };

    strategy.map_err(|err| match err {
        MeridianError::InvalidParameter { name, reason } => MeridianError::ConfigInvalid {
            section: STRATEGY.to_string(),
            key: name,
            reason,
        },
        other => other,
    })
}

pub fn validate_allocation(config: &dyn ConfigPort) -> Result<f64, MeridianError> {
    let value = config
        .get_double(STRATEGY, "allocation")?
        .unwrap_or(DEFAULT_ALLOCATION);
    if value <= 0.0 || value > 1.0 || value.is_nan() {
        return Err(MeridianError::config_invalid(
            STRATEGY,
            "allocation",
            "allocation must be between 0 and 1",
        ));
    }
    Ok(value)
}

fn window(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, MeridianError> {
    match config.get_int(STRATEGY, key)? {
        None => Ok(default),
        Some(value) if value >= 1 => usize::try_from(value)
            .map_err(|e| MeridianError::config_invalid(STRATEGY, key, e.to_string())),
        Some(value) => Err(MeridianError::config_invalid(
            STRATEGY,
            key,
            format!("{} must be at least 1, got {}", key, value),
        )),
    }
}
