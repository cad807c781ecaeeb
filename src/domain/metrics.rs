//! Performance analyzer.
//!
//! Every statistic here is computed in one pass over a finished equity curve
//! and trade log. Nothing is accumulated while the backtest runs.

use super::backtest::EquityPoint;
use super::ohlcv::days_between;
use super::position::Trade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.0;

/// Statistics over fills that realized P&L.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeStats {
    pub closing_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Gross profit over gross loss. Infinite when there are wins and no losses.
    pub profit_factor: f64,
    pub avg_win: f64,
    /// Reported as a positive magnitude.
    pub avg_loss: f64,
    pub largest_win: f64,
    /// Reported as a positive magnitude.
    pub largest_loss: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of consecutive bars below the running peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trade_stats: TradeStats,
}

impl Metrics {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = total_return(initial_capital, final_equity);
        let annualized_return = annualized_return(equity_curve, total_return);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let returns = period_returns(equity_curve);
        let sharpe_ratio = sharpe_ratio(&returns, daily_rf);
        let sortino_ratio = sortino_ratio(&returns, daily_rf);

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        Metrics {
            final_equity,
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades: trades.len(),
            trade_stats: TradeStats::compute(trades),
        }
    }
}

impl TradeStats {
    pub fn compute(trades: &[Trade]) -> Self {
        let mut stats = TradeStats::default();
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;

        for pnl in trades.iter().filter_map(|t| t.realized_pnl) {
            stats.closing_trades += 1;
            if pnl > 0.0 {
                stats.winning_trades += 1;
                total_wins += pnl;
                stats.largest_win = stats.largest_win.max(pnl);
            } else if pnl < 0.0 {
                stats.losing_trades += 1;
                total_losses += pnl.abs();
                stats.largest_loss = stats.largest_loss.max(pnl.abs());
            }
        }

        if stats.closing_trades > 0 {
            stats.win_rate = stats.winning_trades as f64 / stats.closing_trades as f64;
        }
        stats.profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        if stats.winning_trades > 0 {
            stats.avg_win = total_wins / stats.winning_trades as f64;
        }
        if stats.losing_trades > 0 {
            stats.avg_loss = total_losses / stats.losing_trades as f64;
        }
        stats
    }
}

pub fn total_return(initial_capital: f64, final_equity: f64) -> f64 {
    if initial_capital > 0.0 {
        (final_equity - initial_capital) / initial_capital
    } else {
        0.0
    }
}

/// Compound `total_return` over the calendar span of the curve.
///
/// Zero when the curve spans no time. A wiped-out account (1 + r <= 0)
/// annualizes to -1.
pub fn annualized_return(equity_curve: &[EquityPoint], total_return: f64) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    let days = days_between(first.timestamp, last.timestamp);
    if days <= 0.0 || !total_return.is_finite() {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(DAYS_PER_YEAR / days) - 1.0
}

fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 { (curr - prev) / prev } else { 0.0 }
        })
        .collect()
}

/// Annualized Sharpe ratio using the sample standard deviation.
///
/// Zero when there are fewer than two returns or they have no variance.
pub fn sharpe_ratio(returns: &[f64], daily_rf: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        (mean - daily_rf) / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Like Sharpe but penalizing only returns below the risk-free rate.
pub fn sortino_ratio(returns: &[f64], daily_rf: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let downside = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();

    if downside_stddev > 0.0 {
        (mean - daily_rf) / downside_stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Maximum peak-to-trough decline as a fraction of the running peak, and
/// the longest stretch of bars spent below a peak.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            duration = 0;
            continue;
        }
        duration += 1;
        max_duration = max_duration.max(duration);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }

    (max_dd, max_duration)
}
