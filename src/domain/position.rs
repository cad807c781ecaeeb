//! Position tracking and the trade log entry type.

use chrono::NaiveDateTime;
use std::fmt;

/// A leftover quantity within this fraction of the larger of the holding and
/// the fill is rounding residue and is snapped to zero.
const DUST_RATIO: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// An open holding. Quantity is signed: positive is long, negative is short.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub average_entry_price: f64,
    pub realized_pnl: f64,
}

impl Position {
    pub fn new(symbol: &str) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity: 0.0,
            average_entry_price: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    /// Signed value of the holding at `price`; shorts contribute negatively.
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.average_entry_price)
    }

    /// Apply a fill and return the P&L it realized, if it reduced exposure.
    ///
    /// Fills in the direction of the holding re-average the entry price by
    /// volume. Fills against it keep the average and realize P&L on the
    /// closed quantity; anything left over after crossing zero opens a new
    /// holding at the fill price.
    pub fn apply_fill(&mut self, side: Side, quantity: f64, price: f64) -> Option<f64> {
        let signed = side.sign() * quantity;

        if self.is_flat() || self.quantity.signum() == signed.signum() {
            let new_quantity = self.quantity + signed;
            self.average_entry_price = (self.quantity.abs() * self.average_entry_price
                + quantity * price)
                / new_quantity.abs();
            self.quantity = new_quantity;
            return None;
        }

        let dust = quantity.max(self.quantity.abs()) * DUST_RATIO;
        let closed = quantity.min(self.quantity.abs());
        let pnl = closed * (price - self.average_entry_price) * self.quantity.signum();
        self.realized_pnl += pnl;

        let remainder = quantity - closed;
        if remainder > dust {
            self.quantity = side.sign() * remainder;
            self.average_entry_price = price;
        } else {
            self.quantity += signed;
            if self.quantity.abs() <= dust {
                self.quantity = 0.0;
                self.average_entry_price = 0.0;
            }
        }
        Some(pnl)
    }
}

/// A single executed fill. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub timestamp: NaiveDateTime,
    /// Cash paid out; zero for sells.
    pub cost: f64,
    /// Cash received; zero for buys.
    pub revenue: f64,
    /// Set when the fill reduced an existing holding.
    pub realized_pnl: Option<f64>,
}

impl Trade {
    /// Signed effect on cash: revenue minus cost.
    pub fn cash_flow(&self) -> f64 {
        self.revenue - self.cost
    }
}
