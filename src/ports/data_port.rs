//! Price data access port trait.

use crate::domain::error::MeridianError;
use crate::domain::ohlcv::PriceTable;
use std::path::Path;

pub trait DataPort {
    /// Load a validated, strictly time-ordered price table.
    fn load_prices(&self, path: &Path) -> Result<PriceTable, MeridianError>;
}
