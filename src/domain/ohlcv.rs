//! OHLCV bar representation and the validated, time-ordered price table.

use chrono::NaiveDateTime;

use super::error::MeridianError;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// An immutable sequence of bars with strictly increasing timestamps.
///
/// Gaps between bars are allowed; duplicates and out-of-order rows are not.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    bars: Vec<PriceBar>,
}

impl PriceTable {
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, MeridianError> {
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(MeridianError::UnorderedTimestamps { index: pos + 1 });
        }
        Ok(PriceTable { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// Fractional number of days between the first and last bar.
    pub fn span_days(&self) -> f64 {
        match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => days_between(first, last),
            _ => 0.0,
        }
    }
}

pub fn days_between(first: NaiveDateTime, last: NaiveDateTime) -> f64 {
    (last - first).num_seconds() as f64 / SECONDS_PER_DAY
}
