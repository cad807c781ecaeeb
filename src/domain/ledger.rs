//! Cash, positions, and the trade log for a single backtest run.
//!
//! The ledger has exactly one writer (the engine driving the run). Strategies
//! only ever see `&Positions`, so they cannot change ledger state except by
//! returning actions.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

use super::error::MeridianError;
use super::position::{Position, Side, Trade};

/// Open positions keyed by symbol. A symbol is inserted on its first fill
/// and removed when its quantity returns to zero.
pub type Positions = BTreeMap<String, Position>;

/// Which fills the ledger accepts beyond basic well-formedness.
///
/// The permissive policy allows short selling (selling more than is held)
/// and buying beyond available cash; neither is checked against buying
/// power. The strict policy rejects both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPolicy {
    pub allow_short: bool,
    pub allow_negative_cash: bool,
}

impl ExecutionPolicy {
    pub fn permissive() -> Self {
        ExecutionPolicy {
            allow_short: true,
            allow_negative_cash: true,
        }
    }

    pub fn strict() -> Self {
        ExecutionPolicy {
            allow_short: false,
            allow_negative_cash: false,
        }
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        ExecutionPolicy::permissive()
    }
}

/// A fill request at a resolved price.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    cash: f64,
    initial_capital: f64,
    policy: ExecutionPolicy,
    positions: Positions,
    trades: Vec<Trade>,
}

impl Ledger {
    pub fn new(initial_capital: f64, policy: ExecutionPolicy) -> Self {
        Ledger {
            cash: initial_capital,
            initial_capital,
            policy,
            positions: Positions::new(),
            trades: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Read-only view of open positions for strategy consumption.
    pub fn snapshot_positions(&self) -> &Positions {
        &self.positions
    }

    /// Execute `order` at its price, update cash and positions, and append
    /// the resulting trade to the log.
    pub fn apply(
        &mut self,
        order: &Order,
        timestamp: NaiveDateTime,
    ) -> Result<&Trade, MeridianError> {
        validate_order(order)?;

        let notional = order.quantity * order.price;
        let held = self
            .positions
            .get(&order.symbol)
            .map_or(0.0, |p| p.quantity);

        match order.side {
            Side::Buy if !self.policy.allow_negative_cash && notional > self.cash => {
                return Err(MeridianError::OrderRejected {
                    reason: format!(
                        "buy of {} {} costs {:.2}, only {:.2} cash available",
                        order.quantity, order.symbol, notional, self.cash
                    ),
                });
            }
            Side::Sell if !self.policy.allow_short && order.quantity > held => {
                return Err(MeridianError::OrderRejected {
                    reason: format!(
                        "sell of {} {} exceeds held quantity {}",
                        order.quantity, order.symbol, held
                    ),
                });
            }
            _ => {}
        }

        let (cost, revenue) = match order.side {
            Side::Buy => (notional, 0.0),
            Side::Sell => (0.0, notional),
        };
        self.cash += revenue - cost;

        let position = self
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position::new(&order.symbol));
        let realized_pnl = position.apply_fill(order.side, order.quantity, order.price);
        if position.is_flat() {
            self.positions.remove(&order.symbol);
        }

        self.trades.push(Trade {
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            timestamp,
            cost,
            revenue,
            realized_pnl,
        });

        let trade = self.trades.len() - 1;
        Ok(&self.trades[trade])
    }

    /// Cash plus the signed market value of every open position.
    ///
    /// Positions without an entry in `prices` are valued at their average
    /// entry price.
    pub fn mark_to_market(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = prices
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.average_entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Give up the trade log, leaving the ledger's log empty.
    pub(crate) fn take_trades(&mut self) -> Vec<Trade> {
        std::mem::take(&mut self.trades)
    }
}

fn validate_order(order: &Order) -> Result<(), MeridianError> {
    if order.symbol.trim().is_empty() {
        return Err(MeridianError::invalid_action("symbol must not be empty"));
    }
    if !order.quantity.is_finite() || order.quantity <= 0.0 {
        return Err(MeridianError::invalid_action(format!(
            "quantity must be positive, got {}",
            order.quantity
        )));
    }
    if !order.price.is_finite() || order.price <= 0.0 {
        return Err(MeridianError::invalid_action(format!(
            "price must be positive, got {}",
            order.price
        )));
    }
    Ok(())
}
