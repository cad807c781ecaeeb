//! Strategy calling contract and the built-in strategies.
//!
//! A strategy is a pure function of the current bar, a read-only view of the
//! open positions, the current cash, and the price history up to and
//! including the current bar. It answers with an [`Action`]; the engine is the
//! only party that turns actions into ledger changes.

use super::indicator::{macd, rsi, sma};
use super::ledger::{Order, Positions};
use super::ohlcv::PriceBar;
use super::position::Side;
use crate::domain::error::MeridianError;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Buy { symbol: String, quantity: f64 },
    Sell { symbol: String, quantity: f64 },
}

impl Action {
    /// Resolve the action into an order filled at `price`.
    pub fn to_order(&self, price: f64) -> Option<Order> {
        match self {
            Action::None => None,
            Action::Buy { symbol, quantity } => Some(Order {
                symbol: symbol.clone(),
                side: Side::Buy,
                quantity: *quantity,
                price,
            }),
            Action::Sell { symbol, quantity } => Some(Order {
                symbol: symbol.clone(),
                side: Side::Sell,
                quantity: *quantity,
                price,
            }),
        }
    }
}

pub trait Strategy {
    fn on_bar(
        &self,
        bar: &PriceBar,
        positions: &Positions,
        cash: f64,
        history: &[PriceBar],
    ) -> Action;

    fn name(&self) -> String {
        "custom".to_string()
    }
}

impl<F> Strategy for F
where
    F: Fn(&PriceBar, &Positions, f64, &[PriceBar]) -> Action,
{
    fn on_bar(
        &self,
        bar: &PriceBar,
        positions: &Positions,
        cash: f64,
        history: &[PriceBar],
    ) -> Action {
        self(bar, positions, cash, history)
    }
}

/// Pins a closure to the strategy signature so its argument types are inferred.
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&PriceBar, &Positions, f64, &[PriceBar]) -> Action,
{
    f
}

fn check_allocation(allocation: f64) -> Result<(), MeridianError> {
    if !(allocation > 0.0 && allocation <= 1.0) {
        return Err(MeridianError::invalid_parameter(
            "allocation",
            format!("must be in (0, 1], got {}", allocation),
        ));
    }
    Ok(())
}

fn check_positive(name: &str, window: usize) -> Result<(), MeridianError> {
    if window == 0 {
        return Err(MeridianError::invalid_parameter(name, "must be positive"));
    }
    Ok(())
}

/// Size an entry as a fraction of cash at the bar's close.
///
/// The quantity is nudged down until its notional fits the budget, so a
/// full allocation never costs more than the cash on hand.
fn entry_quantity(cash: f64, allocation: f64, price: f64) -> Option<f64> {
    let budget = cash * allocation;
    let mut quantity = budget / price;
    if !(quantity.is_finite() && quantity > 0.0) {
        return None;
    }
    while quantity * price > budget {
        quantity = quantity.next_down();
    }
    (quantity > 0.0).then_some(quantity)
}

fn long_quantity(positions: &Positions, symbol: &str) -> Option<f64> {
    positions
        .get(symbol)
        .map(|p| p.quantity)
        .filter(|q| *q > 0.0)
}

fn closes(history: &[PriceBar]) -> Vec<f64> {
    history.iter().map(|b| b.close).collect()
}

/// Moving-average crossover: enter when the fast SMA is above the slow SMA
/// and nothing is held, exit the whole holding when it drops below.
#[derive(Debug, Clone, PartialEq)]
pub struct SmaCrossover {
    pub symbol: String,
    pub fast: usize,
    pub slow: usize,
    pub allocation: f64,
}

impl SmaCrossover {
    pub fn new(symbol: &str, fast: usize, slow: usize, allocation: f64) -> Result<Self, MeridianError> {
        check_positive("fast", fast)?;
        check_positive("slow", slow)?;
        if fast >= slow {
            return Err(MeridianError::invalid_parameter(
                "fast",
                format!("fast window {} must be shorter than slow window {}", fast, slow),
            ));
        }
        check_allocation(allocation)?;
        Ok(SmaCrossover {
            symbol: symbol.to_string(),
            fast,
            slow,
            allocation,
        })
    }
}

fn trailing_sma(closes: &[f64], window: usize) -> Option<f64> {
    let tail = closes.get(closes.len().checked_sub(window)?..)?;
    sma(tail, window).ok()?.last().copied().flatten()
}

impl Strategy for SmaCrossover {
    fn on_bar(
        &self,
        bar: &PriceBar,
        positions: &Positions,
        cash: f64,
        history: &[PriceBar],
    ) -> Action {
        if history.len() < self.slow {
            return Action::None;
        }
        let closes = closes(history);
        let (Some(fast), Some(slow)) = (
            trailing_sma(&closes, self.fast),
            trailing_sma(&closes, self.slow),
        ) else {
            return Action::None;
        };

        let held = positions.contains_key(&self.symbol);
        if fast > slow && !held {
            if let Some(quantity) = entry_quantity(cash, self.allocation, bar.close) {
                return Action::Buy {
                    symbol: self.symbol.clone(),
                    quantity,
                };
            }
        } else if fast < slow {
            if let Some(quantity) = long_quantity(positions, &self.symbol) {
                return Action::Sell {
                    symbol: self.symbol.clone(),
                    quantity,
                };
            }
        }
        Action::None
    }

    fn name(&self) -> String {
        format!("sma_crossover({},{})", self.fast, self.slow)
    }
}

/// RSI mean reversion: enter below `oversold` when flat, exit the whole
/// holding above `overbought`.
#[derive(Debug, Clone, PartialEq)]
pub struct RsiReversion {
    pub symbol: String,
    pub window: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub allocation: f64,
}

impl RsiReversion {
    pub fn new(
        symbol: &str,
        window: usize,
        oversold: f64,
        overbought: f64,
        allocation: f64,
    ) -> Result<Self, MeridianError> {
        check_positive("rsi_window", window)?;
        if !(0.0..=100.0).contains(&oversold)
            || !(0.0..=100.0).contains(&overbought)
            || oversold >= overbought
        {
            return Err(MeridianError::invalid_parameter(
                "oversold",
                format!(
                    "thresholds must satisfy 0 <= oversold < overbought <= 100, got {} / {}",
                    oversold, overbought
                ),
            ));
        }
        check_allocation(allocation)?;
        Ok(RsiReversion {
            symbol: symbol.to_string(),
            window,
            oversold,
            overbought,
            allocation,
        })
    }
}

impl Strategy for RsiReversion {
    fn on_bar(
        &self,
        bar: &PriceBar,
        positions: &Positions,
        cash: f64,
        history: &[PriceBar],
    ) -> Action {
        if history.len() <= self.window {
            return Action::None;
        }
        let Some(value) = rsi(&closes(history), self.window)
            .ok()
            .and_then(|s| s.last().copied().flatten())
        else {
            return Action::None;
        };

        let held = positions.contains_key(&self.symbol);
        if value < self.oversold && !held {
            if let Some(quantity) = entry_quantity(cash, self.allocation, bar.close) {
                return Action::Buy {
                    symbol: self.symbol.clone(),
                    quantity,
                };
            }
        } else if value > self.overbought {
            if let Some(quantity) = long_quantity(positions, &self.symbol) {
                return Action::Sell {
                    symbol: self.symbol.clone(),
                    quantity,
                };
            }
        }
        Action::None
    }

    fn name(&self) -> String {
        format!(
            "rsi_reversion({},{},{})",
            self.window, self.oversold, self.overbought
        )
    }
}

/// MACD signal-line crossover: enter when the MACD line crosses above the
/// signal line while flat, exit when it crosses back below.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdCrossover {
    pub symbol: String,
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub allocation: f64,
}

impl MacdCrossover {
    pub fn new(
        symbol: &str,
        fast: usize,
        slow: usize,
        signal: usize,
        allocation: f64,
    ) -> Result<Self, MeridianError> {
        check_positive("fast", fast)?;
        check_positive("slow", slow)?;
        check_positive("signal", signal)?;
        if fast >= slow {
            return Err(MeridianError::invalid_parameter(
                "fast",
                format!("fast window {} must be shorter than slow window {}", fast, slow),
            ));
        }
        check_allocation(allocation)?;
        Ok(MacdCrossover {
            symbol: symbol.to_string(),
            fast,
            slow,
            signal,
            allocation,
        })
    }
}

impl Strategy for MacdCrossover {
    fn on_bar(
        &self,
        bar: &PriceBar,
        positions: &Positions,
        cash: f64,
        history: &[PriceBar],
    ) -> Action {
        let n = history.len();
        if n < self.slow + self.signal {
            return Action::None;
        }
        let Ok(out) = macd(&closes(history), self.fast, self.slow, self.signal) else {
            return Action::None;
        };
        let (Some(prev_line), Some(prev_signal), Some(line), Some(signal)) = (
            out.line[n - 2],
            out.signal[n - 2],
            out.line[n - 1],
            out.signal[n - 1],
        ) else {
            return Action::None;
        };

        let held = positions.contains_key(&self.symbol);
        let crossed_up = prev_line <= prev_signal && line > signal;
        let crossed_down = prev_line >= prev_signal && line < signal;

        if crossed_up && !held {
            if let Some(quantity) = entry_quantity(cash, self.allocation, bar.close) {
                return Action::Buy {
                    symbol: self.symbol.clone(),
                    quantity,
                };
            }
        } else if crossed_down {
            if let Some(quantity) = long_quantity(positions, &self.symbol) {
                return Action::Sell {
                    symbol: self.symbol.clone(),
                    quantity,
                };
            }
        }
        Action::None
    }

    fn name(&self) -> String {
        format!(
            "macd_crossover({},{},{})",
            self.fast, self.slow, self.signal
        )
    }
}

/// One of the built-in strategies, as selected by configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinStrategy {
    SmaCrossover(SmaCrossover),
    RsiReversion(RsiReversion),
    MacdCrossover(MacdCrossover),
}

impl Strategy for BuiltinStrategy {
    fn on_bar(
        &self,
        bar: &PriceBar,
        positions: &Positions,
        cash: f64,
        history: &[PriceBar],
    ) -> Action {
        match self {
            BuiltinStrategy::SmaCrossover(s) => s.on_bar(bar, positions, cash, history),
            BuiltinStrategy::RsiReversion(s) => s.on_bar(bar, positions, cash, history),
            BuiltinStrategy::MacdCrossover(s) => s.on_bar(bar, positions, cash, history),
        }
    }

    fn name(&self) -> String {
        match self {
            BuiltinStrategy::SmaCrossover(s) => s.name(),
            BuiltinStrategy::RsiReversion(s) => s.name(),
            BuiltinStrategy::MacdCrossover(s) => s.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Position;
    use chrono::NaiveDate;

    fn history(prices: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn holding(symbol: &str, quantity: f64) -> Positions {
        let mut positions = Positions::new();
        positions.insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                quantity,
                average_entry_price: 10.0,
                realized_pnl: 0.0,
            },
        );
        positions
    }

    #[test]
    fn action_to_order() {
        let buy = Action::Buy {
            symbol: "BHP".into(),
            quantity: 2.0,
        };
        let order = buy.to_order(10.0).unwrap();
        assert_eq!(order.side, Side::Buy);
        assert!((order.price - 10.0).abs() < f64::EPSILON);
        assert!(Action::None.to_order(10.0).is_none());
    }

    #[test]
    fn closure_is_a_strategy() {
        let strategy = from_fn(|bar, _positions, _cash, _history| {
            if bar.close > 10.0 {
                Action::Buy {
                    symbol: "X".into(),
                    quantity: 1.0,
                }
            } else {
                Action::None
            }
        });
        let bars = history(&[5.0, 12.0]);
        let positions = Positions::new();
        assert_eq!(strategy.on_bar(&bars[0], &positions, 100.0, &bars[..1]), Action::None);
        assert!(matches!(
            strategy.on_bar(&bars[1], &positions, 100.0, &bars),
            Action::Buy { .. }
        ));
        assert_eq!(strategy.name(), "custom");
    }

    #[test]
    fn sma_crossover_waits_for_lookback() {
        let s = SmaCrossover::new("X", 2, 4, 0.1).unwrap();
        let bars = history(&[1.0, 2.0, 3.0]);
        assert_eq!(
            s.on_bar(&bars[2], &Positions::new(), 1000.0, &bars),
            Action::None
        );
    }

    #[test]
    fn sma_crossover_buys_fraction_of_cash() {
        let s = SmaCrossover::new("X", 2, 4, 0.1).unwrap();
        let bars = history(&[1.0, 2.0, 3.0, 5.0]);
        match s.on_bar(&bars[3], &Positions::new(), 1000.0, &bars) {
            Action::Buy { symbol, quantity } => {
                assert_eq!(symbol, "X");
                assert!((quantity - 1000.0 * 0.1 / 5.0).abs() < 1e-12);
            }
            other => panic!("expected buy, got {:?}", other),
        }
    }

    #[test]
    fn sma_crossover_does_not_pyramid() {
        let s = SmaCrossover::new("X", 2, 4, 0.1).unwrap();
        let bars = history(&[1.0, 2.0, 3.0, 5.0]);
        assert_eq!(
            s.on_bar(&bars[3], &holding("X", 3.0), 1000.0, &bars),
            Action::None
        );
    }

    #[test]
    fn sma_crossover_sells_whole_position() {
        let s = SmaCrossover::new("X", 2, 4, 0.1).unwrap();
        let bars = history(&[5.0, 4.0, 3.0, 1.0]);
        assert_eq!(
            s.on_bar(&bars[3], &holding("X", 3.0), 1000.0, &bars),
            Action::Sell {
                symbol: "X".into(),
                quantity: 3.0
            }
        );
    }

    #[test]
    fn sma_crossover_rejects_bad_parameters() {
        assert!(SmaCrossover::new("X", 5, 5, 0.1).is_err());
        assert!(SmaCrossover::new("X", 0, 5, 0.1).is_err());
        assert!(SmaCrossover::new("X", 2, 5, 0.0).is_err());
        assert!(SmaCrossover::new("X", 2, 5, 1.5).is_err());
    }

    #[test]
    fn rsi_reversion_buys_when_oversold() {
        let s = RsiReversion::new("X", 3, 30.0, 70.0, 0.5).unwrap();
        let bars = history(&[10.0, 9.0, 8.0, 7.0, 6.0]);
        assert!(matches!(
            s.on_bar(&bars[4], &Positions::new(), 100.0, &bars),
            Action::Buy { .. }
        ));
    }

    #[test]
    fn rsi_reversion_sells_when_overbought() {
        let s = RsiReversion::new("X", 3, 30.0, 70.0, 0.5).unwrap();
        let bars = history(&[6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(
            s.on_bar(&bars[4], &holding("X", 2.0), 100.0, &bars),
            Action::Sell {
                symbol: "X".into(),
                quantity: 2.0
            }
        );
    }

    #[test]
    fn rsi_reversion_rejects_inverted_thresholds() {
        assert!(RsiReversion::new("X", 14, 70.0, 30.0, 0.5).is_err());
        assert!(RsiReversion::new("X", 14, -1.0, 30.0, 0.5).is_err());
    }

    #[test]
    fn macd_crossover_ignores_short_history() {
        let s = MacdCrossover::new("X", 3, 6, 3, 0.5).unwrap();
        let bars = history(&[1.0; 5]);
        assert_eq!(
            s.on_bar(&bars[4], &Positions::new(), 100.0, &bars),
            Action::None
        );
    }

    #[test]
    fn macd_crossover_buys_on_upturn() {
        let s = MacdCrossover::new("X", 2, 4, 2, 0.5).unwrap();
        // Flat, then a drop pulls the line under the signal, then a jump crosses back.
        let mut prices = vec![100.0; 10];
        prices.push(90.0);
        prices.push(120.0);
        let bars = history(&prices);
        let last = bars.len() - 1;
        assert!(matches!(
            s.on_bar(&bars[last], &Positions::new(), 100.0, &bars),
            Action::Buy { .. }
        ));
    }

    #[test]
    fn builtin_delegates() {
        let inner = SmaCrossover::new("X", 2, 4, 0.1).unwrap();
        let builtin = BuiltinStrategy::SmaCrossover(inner.clone());
        let bars = history(&[1.0, 2.0, 3.0, 5.0]);
        let positions = Positions::new();
        assert_eq!(
            builtin.on_bar(&bars[3], &positions, 1000.0, &bars),
            inner.on_bar(&bars[3], &positions, 1000.0, &bars)
        );
        assert_eq!(builtin.name(), inner.name());
    }

    #[test]
    fn strategy_names() {
        assert_eq!(
            SmaCrossover::new("X", 10, 20, 0.1).unwrap().name(),
            "sma_crossover(10,20)"
        );
        assert_eq!(
            MacdCrossover::new("X", 12, 26, 9, 0.1)
                .unwrap()
                .name(),
            "macd_crossover(12,26,9)"
        );
    }
    #[test]
    fn full_allocation_never_exceeds_cash() {
        let cash = 508_475.645_601_156_8;
        let price = 778.664_172_385_145_7;
        let quantity = entry_quantity(cash, 1.0, price).unwrap();
        assert!(quantity * price <= cash);
        assert!(cash - quantity * price < 1e-6);

        for i in 1..500 {
            let cash = 1_000.0 + i as f64 * 1_017.37;
            let price = 3.0 + i as f64 * 1.913;
            let quantity = entry_quantity(cash, 1.0, price).unwrap();
            assert!(quantity * price <= cash, "cash {} price {}", cash, price);
        }
    }

    #[test]
    fn entry_quantity_rejects_empty_budget() {
        assert!(entry_quantity(0.0, 0.5, 10.0).is_none());
        assert!(entry_quantity(-100.0, 0.5, 10.0).is_none());
    }
}
